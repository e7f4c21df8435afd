//! Query Result - what the executor hands back for a statement

use serde::{Deserialize, Serialize};

pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// Seconds
    pub execution_time: f64,
    /// Rows beyond the configured cap were dropped.
    pub limited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub message: String,
    pub rows_affected: u64,
    /// Seconds
    pub execution_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows(RowSet),
    Affected(WriteSummary),
}

impl ExecutionOutcome {
    pub fn execution_time(&self) -> f64 {
        match self {
            ExecutionOutcome::Rows(rows) => rows.execution_time,
            ExecutionOutcome::Affected(summary) => summary.execution_time,
        }
    }
}

impl WriteSummary {
    pub fn new(rows_affected: u64, execution_time: f64) -> Self {
        Self {
            message: format!("Query executed successfully. Rows affected: {}", rows_affected),
            rows_affected,
            execution_time,
        }
    }
}
