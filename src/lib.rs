//! Natural-language to SQL engine
//!
//! Turns free-text requests into SQL with a schema-aware prompt, a bounded
//! retry loop around an OpenAI-compatible completion service, and a safety
//! gate in front of every execution.

pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod execution;
pub mod extractor;
pub mod generation_loop;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod report;
pub mod safety;
pub mod schema;
pub mod service;
pub mod suggestions;
pub mod validation;

pub use config::Config;
pub use error::{NlSqlError, Result};
pub use service::NlSqlService;
