//! Generation Retry Controller
//!
//! Bounded, strictly sequential retry loop around the completion service.

use crate::error::NlSqlError;
use crate::extractor::ResponseExtractor;
use crate::generation_loop::state::{
    attempt_confidence, AttemptResult, GenerationAttempt, RetryState,
};
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};
use crate::prompt::{PromptComposer, PromptInputs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const GENERATION_TEMPERATURE: f32 = 0.1;
pub const GENERATION_TOP_P: f32 = 0.9;
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedSql {
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    /// One-based count of attempts used.
    pub attempts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Final attempt replied but held no statement.
    NoSqlExtracted,
    /// Final attempt failed in transport.
    ServiceError,
    /// Budget was zero.
    NoAttempts,
    /// The service reported a configuration problem; no retry was made.
    Configuration,
    /// Some other non-retryable failure stopped the loop.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// Raw reply of the final attempt, when it produced one.
    pub diagnostic: Option<String>,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationOutcome {
    Accepted(AcceptedSql),
    Failed(GenerationFailure),
}

impl GenerationOutcome {
    pub fn into_result(self) -> crate::error::Result<AcceptedSql> {
        match self {
            GenerationOutcome::Accepted(accepted) => Ok(accepted),
            GenerationOutcome::Failed(failure) => Err(failure.into()),
        }
    }
}

impl From<GenerationFailure> for NlSqlError {
    fn from(failure: GenerationFailure) -> Self {
        match failure.kind {
            FailureKind::ServiceError => NlSqlError::Service(failure.reason),
            FailureKind::Configuration => NlSqlError::Configuration(failure.reason),
            FailureKind::NoSqlExtracted | FailureKind::NoAttempts | FailureKind::Aborted => NlSqlError::Generation {
                message: failure.reason,
                raw_response: failure.diagnostic,
            },
        }
    }
}

pub struct GenerationRetryController<'a> {
    completion: &'a dyn CompletionService,
    composer: &'a PromptComposer,
    extractor: ResponseExtractor,
    max_attempts: usize,
}

impl<'a> GenerationRetryController<'a> {
    pub fn new(
        completion: &'a dyn CompletionService,
        composer: &'a PromptComposer,
        max_attempts: usize,
    ) -> Self {
        Self {
            completion,
            composer,
            extractor: ResponseExtractor::new(),
            max_attempts,
        }
    }

    /// Drive attempts until one yields a statement or the budget runs out.
    pub async fn generate(&self, inputs: &PromptInputs<'_>) -> GenerationOutcome {
        let system_prompt = self.composer.system_prompt();
        let mut state = RetryState::Idle;
        let mut accepted: Option<AcceptedSql> = None;
        let mut last_failure: Option<(FailureKind, String, Option<String>)> = None;

        loop {
            let index = match state {
                RetryState::Idle => {
                    state = RetryState::start(self.max_attempts);
                    continue;
                }
                RetryState::Retrying(_) => {
                    state = state.resume();
                    continue;
                }
                RetryState::Succeeded(_) | RetryState::Exhausted(_) => break,
                RetryState::Attempting(index) => index,
            };

            info!("Generation attempt {} of {}", index + 1, self.max_attempts);
            let attempt = GenerationAttempt {
                index,
                prompt: self.composer.compose(inputs, index),
                raw_response: None,
            };
            debug!("Prompt for attempt {}:\n{}", index + 1, attempt.prompt);

            let result = match self.run_attempt(attempt, &system_prompt).await {
                Ok(attempt) => {
                    let raw = attempt.raw_response.unwrap_or_default();
                    match self.extractor.extract(&raw) {
                        Some(candidate) => {
                            let confidence = attempt_confidence(index);
                            info!(
                                "✅ SQL extracted on attempt {} (confidence {:.2})",
                                index + 1,
                                confidence
                            );
                            accepted = Some(AcceptedSql {
                                sql: candidate.sql,
                                confidence,
                                explanation: candidate.explanation,
                                attempts: index + 1,
                            });
                            AttemptResult::Extracted
                        }
                        None => {
                            warn!("Attempt {} returned no extractable SQL", index + 1);
                            last_failure = Some((
                                FailureKind::NoSqlExtracted,
                                "Could not extract valid SQL from AI response".to_string(),
                                Some(raw),
                            ));
                            AttemptResult::NothingExtracted
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("Attempt {} failed: {}", index + 1, e);
                    last_failure = Some((
                        FailureKind::ServiceError,
                        format!("All retry attempts failed. Last error: {}", e),
                        None,
                    ));
                    AttemptResult::TransportFailed
                }
                Err(e) => {
                    warn!("Attempt {} failed and will not be retried: {}", index + 1, e);
                    last_failure = Some(match e {
                        NlSqlError::Configuration(message) => (FailureKind::Configuration, message, None),
                        other => (FailureKind::Aborted, other.to_string(), None),
                    });
                    AttemptResult::Fatal
                }
            };

            state = RetryState::after_attempt(index, self.max_attempts, result);
        }

        if let Some(accepted) = accepted {
            return GenerationOutcome::Accepted(accepted);
        }

        let attempts = match state {
            RetryState::Exhausted(index) if self.max_attempts > 0 => index + 1,
            _ => 0,
        };
        let (kind, reason, diagnostic) = last_failure.unwrap_or((
            FailureKind::NoAttempts,
            "Maximum retry attempts exceeded".to_string(),
            None,
        ));
        GenerationOutcome::Failed(GenerationFailure {
            kind,
            reason,
            diagnostic,
            attempts,
        })
    }

    /// One stateless call; fills in the raw reply.
    async fn run_attempt(
        &self,
        mut attempt: GenerationAttempt,
        system_prompt: &str,
    ) -> crate::error::Result<GenerationAttempt> {
        let request = CompletionRequest {
            model: self.completion.model().to_string(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(attempt.prompt.clone()),
            ],
            max_tokens: self.completion.max_tokens(),
            temperature: GENERATION_TEMPERATURE,
            top_p: Some(GENERATION_TOP_P),
        };
        attempt.raw_response = Some(self.completion.complete(&request).await?);
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use crate::error::Result;
    use crate::intent::QueryIntent;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        fn model(&self) -> &str {
            "test-model"
        }

        fn max_tokens(&self) -> u32 {
            256
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(NlSqlError::Service("script exhausted".to_string())))
        }
    }

    async fn run(service: &Scripted, max_attempts: usize) -> GenerationOutcome {
        let composer = PromptComposer::new(SqlDialect::Postgres);
        let intent = QueryIntent::default();
        let inputs = PromptInputs {
            request: "show all customers",
            schema_context: "Query Operation Type: SELECT",
            intent: &intent,
            prior_context: None,
        };
        GenerationRetryController::new(service, &composer, max_attempts)
            .generate(&inputs)
            .await
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let service = Scripted::new(vec![Ok("SQL: SELECT * FROM customers\nExplanation: all rows".to_string())]);
        match run(&service, 2).await {
            GenerationOutcome::Accepted(accepted) => {
                assert_eq!(accepted.sql, "SELECT * FROM customers");
                assert_eq!(accepted.confidence, 0.9);
                assert_eq!(accepted.explanation, "all rows");
                assert_eq!(accepted.attempts, 1);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_decoding_parameters_fixed() {
        let service = Scripted::new(vec![Ok("SQL: SELECT 1".to_string())]);
        run(&service, 2).await;
        let requests = service.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.temperature, GENERATION_TEMPERATURE);
        assert_eq!(request.top_p, Some(GENERATION_TOP_P));
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
    }

    #[tokio::test]
    async fn test_transport_error_then_success_decays_confidence() {
        let service = Scripted::new(vec![
            Err(NlSqlError::Service("connection reset".to_string())),
            Ok("```sql\nSELECT 2\n```".to_string()),
        ]);
        match run(&service, 2).await {
            GenerationOutcome::Accepted(accepted) => {
                assert_eq!(accepted.sql, "SELECT 2");
                assert_eq!(accepted.confidence, 0.8);
                assert_eq!(accepted.attempts, 2);
            }
            other => panic!("expected success, got {:?}", other),
        }
        let requests = service.requests.lock().unwrap();
        assert!(requests[1].messages[1].content.contains("retry attempt #2"));
    }

    #[tokio::test]
    async fn test_exhausted_by_unparseable_replies_keeps_last_raw() {
        let service = Scripted::new(vec![
            Ok("first: no idea".to_string()),
            Ok("second: still no idea".to_string()),
        ]);
        match run(&service, 2).await {
            GenerationOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::NoSqlExtracted);
                assert_eq!(failure.diagnostic.as_deref(), Some("second: still no idea"));
                assert_eq!(failure.attempts, 2);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_final_transport_error_reports_exception_text() {
        let service = Scripted::new(vec![
            Ok("nothing useful".to_string()),
            Err(NlSqlError::Service("503 upstream".to_string())),
        ]);
        let outcome = run(&service, 2).await;
        let err = outcome.into_result().unwrap_err();
        match err {
            NlSqlError::Service(message) => {
                assert!(message.contains("Last error"));
                assert!(message.contains("503 upstream"));
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_configuration_error_is_not_retried() {
        let service = Scripted::new(vec![
            Err(NlSqlError::Configuration("OpenAI API key not configured".to_string())),
            Ok("SQL: SELECT 1".to_string()),
        ]);
        let outcome = run(&service, 3).await;
        assert_eq!(service.calls(), 1);
        match &outcome {
            GenerationOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::Configuration);
                assert_eq!(failure.attempts, 1);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        match outcome.into_result().unwrap_err() {
            NlSqlError::Configuration(message) => assert_eq!(message, "OpenAI API key not configured"),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_budget_never_calls_service() {
        let service = Scripted::new(vec![Ok("SQL: SELECT 1".to_string())]);
        match run(&service, 0).await {
            GenerationOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::NoAttempts);
                assert_eq!(failure.attempts, 0);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(service.calls(), 0);
    }
}
