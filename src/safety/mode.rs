//! Process-wide safety mode.
//!
//! One `ModeController` per process, shared by handle. Reads take a shared
//! lock and copy the mode out; the toggle holds the write lock while it
//! checks permission and writes, so toggles are applied one at a time.

use crate::error::{NlSqlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyMode {
    Unrestricted,
    SelectOnly,
}

impl SafetyMode {
    pub fn from_select_only(enabled: bool) -> Self {
        if enabled {
            SafetyMode::SelectOnly
        } else {
            SafetyMode::Unrestricted
        }
    }

    pub fn is_select_only(&self) -> bool {
        matches!(self, SafetyMode::SelectOnly)
    }
}

impl fmt::Display for SafetyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyMode::Unrestricted => write!(f, "unrestricted"),
            SafetyMode::SelectOnly => write!(f, "select-only"),
        }
    }
}

/// Result of a successful toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChange {
    pub message: String,
    pub previous_mode: bool,
    pub current_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeStatus {
    pub select_only_mode: bool,
    pub can_toggle: bool,
}

pub struct ModeController {
    mode: RwLock<SafetyMode>,
    toggle_allowed: bool,
}

impl ModeController {
    pub fn new(initial: SafetyMode, toggle_allowed: bool) -> Self {
        Self {
            mode: RwLock::new(initial),
            toggle_allowed,
        }
    }

    /// Consistent copy of the current mode.
    pub fn snapshot(&self) -> SafetyMode {
        *self.mode.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn toggle_allowed(&self) -> bool {
        self.toggle_allowed
    }

    pub fn status(&self) -> ModeStatus {
        ModeStatus {
            select_only_mode: self.snapshot().is_select_only(),
            can_toggle: self.toggle_allowed,
        }
    }

    /// Set the mode. Fails without touching state when toggling is not allowed.
    pub fn set(&self, requested: SafetyMode) -> Result<ModeChange> {
        let mut guard = self.mode.write().unwrap_or_else(|e| e.into_inner());
        if !self.toggle_allowed {
            return Err(NlSqlError::ModeToggleDisabled);
        }

        let previous = *guard;
        *guard = requested;
        drop(guard);

        let message = format!(
            "SELECT-only mode {}",
            if requested.is_select_only() { "enabled" } else { "disabled" }
        );
        info!("{}", message);

        Ok(ModeChange {
            message,
            previous_mode: previous.is_select_only(),
            current_mode: requested.is_select_only(),
        })
    }

    pub fn set_select_only(&self, enabled: bool) -> Result<ModeChange> {
        self.set(SafetyMode::from_select_only(enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_toggle_reports_previous_and_current() {
        let controller = ModeController::new(SafetyMode::Unrestricted, true);
        let change = controller.set_select_only(true).unwrap();
        assert!(!change.previous_mode);
        assert!(change.current_mode);
        assert_eq!(change.message, "SELECT-only mode enabled");
        assert_eq!(controller.snapshot(), SafetyMode::SelectOnly);
    }

    #[test]
    fn test_toggle_denied_leaves_mode_unchanged() {
        let controller = ModeController::new(SafetyMode::Unrestricted, false);
        let before = controller.status();
        let err = controller.set_select_only(true).unwrap_err();
        assert!(matches!(err, NlSqlError::ModeToggleDisabled));
        assert_eq!(controller.status(), before);
        assert!(!controller.status().can_toggle);
    }

    #[test]
    fn test_concurrent_toggles_denied_when_disabled() {
        let controller = Arc::new(ModeController::new(SafetyMode::SelectOnly, false));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || controller.set_select_only(i % 2 == 0))
            })
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert!(matches!(result, Err(NlSqlError::ModeToggleDisabled)));
        }
        assert_eq!(controller.snapshot(), SafetyMode::SelectOnly);
    }

    #[test]
    fn test_concurrent_toggles_report_a_prior_write() {
        let controller = Arc::new(ModeController::new(SafetyMode::Unrestricted, true));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || (i % 2 == 0, controller.set_select_only(i % 2 == 0).unwrap()))
            })
            .collect();
        let changes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (requested, change) in &changes {
            assert_eq!(change.current_mode, *requested);
        }

        // each previous value is the initial state or some earlier write, and the last
        // write is the only one never observed: previous values plus the final mode
        // must equal the requested values plus the initial mode
        let final_select_only = controller.snapshot() == SafetyMode::SelectOnly;
        let seen_true = changes.iter().filter(|(_, c)| c.previous_mode).count() + final_select_only as usize;
        let written_true = changes.iter().filter(|(requested, _)| *requested).count();
        assert_eq!(seen_true, written_true);
    }
}
