use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlSqlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    Generation {
        message: String,
        /// Last raw completion text, kept for diagnosis
        raw_response: Option<String>,
    },

    #[error("Completion service error: {0}")]
    Service(String),

    #[error("{0}")]
    SafetyViolation(String),

    #[error("{0}")]
    Execution(String),

    #[error("Query timeout after {seconds} seconds: {detail}")]
    Timeout { seconds: u64, detail: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mode toggle is disabled by configuration")]
    ModeToggleDisabled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NlSqlError {
    /// True for failures the generation loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NlSqlError::Service(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NlSqlError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, NlSqlError>;
