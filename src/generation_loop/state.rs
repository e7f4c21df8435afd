//! Attempt bookkeeping for the generation loop.
//!
//! The loop is an explicit state machine:
//! `Idle -> Attempting(i) -> {Succeeded | Retrying(i + 1) | Exhausted}`.
//! A fatal attempt goes straight to `Exhausted` whatever budget remains.
//! Transitions are pure so attempt limits can be checked without a model.

use serde::{Deserialize, Serialize};

/// Confidence for a success on the given zero-based attempt.
pub fn attempt_confidence(index: usize) -> f64 {
    let decayed = 0.9 - 0.1 * index as f64;
    // round away float noise such as 0.7999999999999999
    (decayed.max(0.0) * 100.0).round() / 100.0
}

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub index: usize,
    pub prompt: String,
    pub raw_response: Option<String>,
}

/// What a finished attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Extracted,
    NothingExtracted,
    TransportFailed,
    /// The service refused in a way another attempt cannot fix.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting(usize),
    Retrying(usize),
    Succeeded(usize),
    Exhausted(usize),
}

impl RetryState {
    /// First transition out of `Idle`. A zero budget exhausts immediately.
    pub fn start(max_attempts: usize) -> Self {
        if max_attempts == 0 {
            RetryState::Exhausted(0)
        } else {
            RetryState::Attempting(0)
        }
    }

    /// Transition after the attempt at `index` reported `result`.
    pub fn after_attempt(index: usize, max_attempts: usize, result: AttemptResult) -> Self {
        match result {
            AttemptResult::Extracted => RetryState::Succeeded(index),
            AttemptResult::Fatal => RetryState::Exhausted(index),
            _ if index + 1 >= max_attempts => RetryState::Exhausted(index),
            _ => RetryState::Retrying(index + 1),
        }
    }

    /// `Retrying(i)` resumes as `Attempting(i)`; other states are unchanged.
    pub fn resume(self) -> Self {
        match self {
            RetryState::Retrying(next) => RetryState::Attempting(next),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded(_) | RetryState::Exhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_decay() {
        assert_eq!(attempt_confidence(0), 0.9);
        assert_eq!(attempt_confidence(1), 0.8);
        assert_eq!(attempt_confidence(2), 0.7);
        assert_eq!(attempt_confidence(9), 0.0);
        assert_eq!(attempt_confidence(15), 0.0);
        for i in 0..20 {
            assert!(attempt_confidence(i + 1) <= attempt_confidence(i));
            assert!(attempt_confidence(i) <= attempt_confidence(0));
        }
    }

    #[test]
    fn test_two_attempt_budget_transitions() {
        assert_eq!(RetryState::start(2), RetryState::Attempting(0));
        assert_eq!(
            RetryState::after_attempt(0, 2, AttemptResult::NothingExtracted),
            RetryState::Retrying(1)
        );
        assert_eq!(RetryState::Retrying(1).resume(), RetryState::Attempting(1));
        assert_eq!(
            RetryState::after_attempt(1, 2, AttemptResult::TransportFailed),
            RetryState::Exhausted(1)
        );
        assert_eq!(
            RetryState::after_attempt(1, 2, AttemptResult::Extracted),
            RetryState::Succeeded(1)
        );
    }

    #[test]
    fn test_fatal_result_exhausts_with_budget_left() {
        assert_eq!(
            RetryState::after_attempt(0, 3, AttemptResult::Fatal),
            RetryState::Exhausted(0)
        );
        assert!(RetryState::after_attempt(0, 3, AttemptResult::Fatal).is_terminal());
    }

    #[test]
    fn test_zero_budget_exhausts_without_attempting() {
        let state = RetryState::start(0);
        assert!(state.is_terminal());
        assert_eq!(state, RetryState::Exhausted(0));
    }
}
