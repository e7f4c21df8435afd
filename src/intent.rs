//! Intent Classifier
//!
//! Deterministic keyword and pattern analysis of the request text.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref INSERT_CUES: Regex = Regex::new(r"\b(insert|add|create new)\b").unwrap();
    static ref UPDATE_CUES: Regex = Regex::new(r"\b(update|modify|change|set)\b").unwrap();
    static ref DELETE_CUES: Regex = Regex::new(r"\b(delete|remove|drop)\b").unwrap();
    static ref AGGREGATION: Regex =
        Regex::new(r"\b(sum|total|average|avg|count|maximum|max|minimum|min)\b").unwrap();
    static ref ORDERING: Regex = Regex::new(r"\b(sorted|ordered)\s+by\b").unwrap();
    static ref GROUPING: Regex = Regex::new(r"\b(grouped|group)\s+by\b").unwrap();
    static ref TOP_N: Regex = Regex::new(r"\b(top|first|last)\s+(\d+)").unwrap();
    static ref DATE_RANGE: Regex = Regex::new(r"\b(between|from|since|before|after)\b").unwrap();
    static ref JOIN_HINT: Regex =
        Regex::new(r"\b(with|and their|including|along with|join)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Default for Operation {
    fn default() -> Self {
        Operation::Select
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Select => write!(f, "SELECT"),
            Operation::Insert => write!(f, "INSERT"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Structural reading of a request, derived once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub operation: Operation,
    pub has_aggregation: bool,
    pub has_grouping: bool,
    pub has_ordering: bool,
    pub has_limit: bool,
    pub has_joins: bool,
    pub has_date_filter: bool,
}

pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a request. Case is folded here so callers may pass raw text.
    pub fn classify(&self, request: &str) -> QueryIntent {
        let text = request.to_lowercase();

        // First match wins: INSERT, then UPDATE, then DELETE.
        let operation = if INSERT_CUES.is_match(&text) {
            Operation::Insert
        } else if UPDATE_CUES.is_match(&text) {
            Operation::Update
        } else if DELETE_CUES.is_match(&text) {
            Operation::Delete
        } else {
            Operation::Select
        };

        QueryIntent {
            operation,
            has_aggregation: AGGREGATION.is_match(&text),
            has_grouping: GROUPING.is_match(&text),
            has_ordering: ORDERING.is_match(&text),
            has_limit: TOP_N.is_match(&text),
            has_joins: JOIN_HINT.is_match(&text),
            has_date_filter: DATE_RANGE.is_match(&text),
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_listing_is_select() {
        let intent = IntentClassifier::new().classify("show all customers");
        assert_eq!(intent.operation, Operation::Select);
        assert!(!intent.has_aggregation);
        assert!(!intent.has_joins);
    }

    #[test]
    fn test_operation_priority_insert_before_delete() {
        let intent = IntentClassifier::new().classify("add a row and then remove the old one");
        assert_eq!(intent.operation, Operation::Insert);
    }

    #[test]
    fn test_update_before_delete() {
        let intent = IntentClassifier::new().classify("change the status, do not delete anything");
        assert_eq!(intent.operation, Operation::Update);
    }

    #[test]
    fn test_delete_cue() {
        let intent = IntentClassifier::new().classify("Remove inactive accounts");
        assert_eq!(intent.operation, Operation::Delete);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "address" and "settings" must not read as INSERT/UPDATE cues.
        let intent = IntentClassifier::new().classify("list customer address settings");
        assert_eq!(intent.operation, Operation::Select);
    }

    #[test]
    fn test_structural_flags() {
        let intent = IntentClassifier::new()
            .classify("Top 5 products by total sales grouped by region sorted by revenue since 2023");
        assert!(intent.has_limit);
        assert!(intent.has_aggregation);
        assert!(intent.has_grouping);
        assert!(intent.has_ordering);
        assert!(intent.has_date_filter);
    }

    #[test]
    fn test_join_hint_phrases() {
        let classifier = IntentClassifier::new();
        assert!(classifier.classify("customers and their orders").has_joins);
        assert!(classifier.classify("orders along with shipping details").has_joins);
        assert!(!classifier.classify("customers without orders").has_joins);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = IntentClassifier::new();
        let a = classifier.classify("average order value by month");
        let b = classifier.classify("average order value by month");
        assert_eq!(a, b);
    }
}
