//! Query executor trait - the contract the pipeline runs accepted SQL through

use crate::error::Result;
use crate::execution::result::ExecutionOutcome;
use async_trait::async_trait;

/// Runs statements that already passed the safety gate.
///
/// Timeouts must surface as `NlSqlError::Timeout`; callers never retry them.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executor name (e.g., "postgres")
    fn name(&self) -> &'static str;

    /// Execute with positional parameters (`$1`, `$2`, ...), bound in order.
    async fn execute(&self, sql: &str, params: &[serde_json::Value]) -> Result<ExecutionOutcome>;

    /// Check if the backing store is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Whether a statement returns rows, judged by its leading keyword.
pub fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH") || upper.starts_with("VALUES")
}
