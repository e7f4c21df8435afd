//! Response Extractor
//!
//! Pulls a candidate statement and an explanation out of free-form model text.
//! A missing statement is reported as `None` so the caller can retry.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPLANATION: &str = "Query generated successfully";

lazy_static! {
    static ref SQL_MARKER: Regex =
        Regex::new(r"(?is)SQL:\s*(.+?)(?:\n\s*\n|\nExplanation|\nAnalysis|\z)").unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"(?is)```(?:sql)?\s*(.+?)\s*```").unwrap();
    static ref EXPLANATION_MARKER: Regex = Regex::new(r"(?is)(?:Explanation|Analysis):\s*(.+)").unwrap();
    static ref LEADING_FENCE: Regex = Regex::new(r"(?i)^```(?:sql)?\s*").unwrap();
}

/// Statement text plus explanation from one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSql {
    pub sql: String,
    pub explanation: String,
}

pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, raw: &str) -> Option<CandidateSql> {
        let sql = self.extract_sql(raw)?;
        Some(CandidateSql {
            sql,
            explanation: self.extract_explanation(raw),
        })
    }

    /// `SQL:` marker first, then a fenced code block.
    pub fn extract_sql(&self, raw: &str) -> Option<String> {
        let from_marker = SQL_MARKER
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| strip_fences(m.as_str()))
            .filter(|s| !s.is_empty());
        if from_marker.is_some() {
            return from_marker;
        }

        CODE_FENCE
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_explanation(&self, raw: &str) -> String {
        EXPLANATION_MARKER
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string())
    }
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Models sometimes wrap the statement after `SQL:` in a fence anyway.
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = LEADING_FENCE.replace(trimmed, "");
    without_open.trim_end_matches("```").trim().to_string()
}
