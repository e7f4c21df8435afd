//! Advisory Validator
//!
//! Post-acceptance consistency checks. Findings are attached to the result
//! as warnings and never change whether the statement runs.

use crate::schema::SchemaSnapshot;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

const VALID_LEADERS: [&str; 4] = ["SELECT", "INSERT", "UPDATE", "DELETE"];
const DANGEROUS_OPERATIONS: [&str; 3] = ["DROP ", "TRUNCATE ", "ALTER "];
const SUGGESTION_THRESHOLD: f64 = 0.85;

lazy_static! {
    // optional `schema.` prefix, capture the bare table name
    static ref TABLE_REFERENCE: Regex = Regex::new(
        r"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+(?:[a-zA-Z_][a-zA-Z0-9_]*\.)?([a-zA-Z_][a-zA-Z0-9_]*)"
    )
    .unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryReport {
    pub warnings: Vec<String>,
}

impl AdvisoryReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct AdvisoryValidator;

impl AdvisoryValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn review(&self, sql: &str, snapshot: &SchemaSnapshot) -> AdvisoryReport {
        let statement = sql.trim();
        let upper = statement.to_uppercase();
        let mut warnings = Vec::new();

        if !VALID_LEADERS.iter().any(|leader| upper.starts_with(leader)) {
            warnings.push("Query does not start with a valid SQL command".to_string());
        }

        for pattern in DANGEROUS_OPERATIONS {
            if upper.contains(pattern) {
                warnings.push(format!(
                    "Query contains potentially dangerous operation: {}",
                    pattern.trim()
                ));
            }
        }

        if !snapshot.tables.is_empty() {
            let known = snapshot.known_table_names();
            for table in referenced_tables(statement) {
                if !known.contains(&table.to_lowercase()) {
                    warnings.push(unknown_table_warning(&table, snapshot));
                }
            }
        }

        AdvisoryReport { warnings }
    }
}

impl Default for AdvisoryValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifiers following FROM / JOIN / INTO / UPDATE, first mention order, no repeats.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    TABLE_REFERENCE
        .captures_iter(sql)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .unique()
        .collect()
}

fn unknown_table_warning(table: &str, snapshot: &SchemaSnapshot) -> String {
    let lowered = table.to_lowercase();
    let closest = snapshot
        .table_names()
        .into_iter()
        .map(|name| (name, strsim::jaro_winkler(&lowered, &name.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    match closest {
        Some((name, _)) => format!(
            "Table '{}' not found in database schema (did you mean '{}'?)",
            table, name
        ),
        None => format!("Table '{}' not found in database schema", table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableInfo;

    fn snapshot(names: &[&str]) -> SchemaSnapshot {
        SchemaSnapshot {
            tables: names
                .iter()
                .map(|n| TableInfo {
                    schema: "dbo".to_string(),
                    name: n.to_string(),
                    table_type: "BASE TABLE".to_string(),
                    description: String::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_table_named_in_warning() {
        let report = AdvisoryValidator::new().review("SELECT * FROM Ghost", &snapshot(&["Customers"]));
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("'Ghost'"));
    }

    #[test]
    fn test_known_tables_match_case_insensitively() {
        let report = AdvisoryValidator::new().review(
            "select c.name from CUSTOMERS c join dbo.orders o on o.customer_id = c.id",
            &snapshot(&["Customers", "Orders"]),
        );
        assert!(report.is_clean(), "{:?}", report.warnings);
    }

    #[test]
    fn test_near_miss_gets_suggestion() {
        let report = AdvisoryValidator::new().review("SELECT * FROM Customer", &snapshot(&["Customers"]));
        assert!(report.warnings[0].contains("did you mean 'Customers'"));
    }

    #[test]
    fn test_leader_and_dangerous_operation_warnings() {
        let report = AdvisoryValidator::new().review(
            "WITH t AS (SELECT 1) SELECT * FROM t; DROP TABLE t",
            &SchemaSnapshot::default(),
        );
        assert!(report.warnings.iter().any(|w| w.contains("valid SQL command")));
        assert!(report.warnings.iter().any(|w| w.ends_with("DROP")));
    }

    #[test]
    fn test_no_schema_means_no_table_warnings() {
        let report = AdvisoryValidator::new().review("SELECT * FROM anything", &SchemaSnapshot::default());
        assert!(report.is_clean());
    }

    #[test]
    fn test_referenced_tables_deduplicated_in_order() {
        let tables = referenced_tables(
            "INSERT INTO audit SELECT * FROM orders o JOIN customers c ON 1=1 JOIN orders x ON 1=1",
        );
        assert_eq!(tables, vec!["audit", "orders", "customers"]);
    }
}
