//! Safety Gate
//!
//! Decides whether a statement may reach the executor. Two layers run in
//! order against one mode snapshot:
//!
//! - mode gate: under SELECT-only, the statement must lead with `SELECT`
//!   and must not contain any deny-listed keyword anywhere in its text;
//! - keyword guard: under unrestricted mode, destructive keywords are
//!   refused unless the statement leads with `SELECT`.
//!
//! Both layers scan text, they do not parse SQL. Identifiers or literals
//! containing a keyword (`updated_at`, `'drop-off'`) are refused, and
//! keywords hidden by comments or odd spacing can slip through.

use crate::safety::mode::{ModeController, SafetyMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const SELECT_ONLY_DENY_LIST: [&str; 7] =
    ["DROP", "TRUNCATE", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE"];

pub const UNRESTRICTED_DENY_LIST: [&str; 5] = ["DROP", "TRUNCATE", "DELETE FROM", "ALTER", "CREATE"];

/// Verdict of the hard gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationOutcome {
    fn accept(message: &str) -> Self {
        Self {
            is_valid: true,
            message: message.to_string(),
        }
    }

    fn reject(message: String) -> Self {
        Self {
            is_valid: false,
            message,
        }
    }
}

#[derive(Clone)]
pub struct SafetyGate {
    mode: Arc<ModeController>,
}

impl SafetyGate {
    pub fn new(mode: Arc<ModeController>) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &Arc<ModeController> {
        &self.mode
    }

    /// Check a statement against the current mode.
    pub fn check(&self, sql: &str) -> ValidationOutcome {
        let mode = self.mode.snapshot();
        let outcome = Self::check_with_mode(sql, mode);
        if !outcome.is_valid {
            warn!("Query blocked ({}): {}", mode, truncate(sql, 100));
        }
        outcome
    }

    pub fn check_with_mode(sql: &str, mode: SafetyMode) -> ValidationOutcome {
        if sql.trim().is_empty() {
            return ValidationOutcome::reject("Empty query provided".to_string());
        }

        match mode {
            SafetyMode::SelectOnly => mode_gate(sql),
            SafetyMode::Unrestricted => keyword_guard(sql),
        }
    }
}

fn leads_with_select(upper: &str) -> bool {
    upper.trim_start().starts_with("SELECT")
}

fn mode_gate(sql: &str) -> ValidationOutcome {
    let upper = sql.trim().to_uppercase();

    if !leads_with_select(&upper) {
        return ValidationOutcome::reject(
            "Only SELECT queries are allowed in SELECT-only mode".to_string(),
        );
    }

    if let Some(keyword) = SELECT_ONLY_DENY_LIST.iter().find(|k| upper.contains(*k)) {
        return ValidationOutcome::reject(format!(
            "SELECT-only mode: Query contains forbidden keyword: {}",
            keyword
        ));
    }

    ValidationOutcome::accept("SELECT query validated")
}

fn keyword_guard(sql: &str) -> ValidationOutcome {
    let upper = sql.to_uppercase();
    if leads_with_select(&upper) {
        return ValidationOutcome::accept("All operations allowed");
    }

    match UNRESTRICTED_DENY_LIST.iter().find(|k| upper.contains(*k)) {
        Some(keyword) => ValidationOutcome::reject(format!(
            "Query contains potentially dangerous keyword: {}",
            keyword
        )),
        None => ValidationOutcome::accept("All operations allowed"),
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
