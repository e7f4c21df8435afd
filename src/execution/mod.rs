//! Execution layer
//!
//! Contract for running gated statements and the PostgreSQL implementation.

pub mod engine;
pub mod postgres;
pub mod result;

pub use engine::*;
pub use postgres::PgQueryExecutor;
pub use result::*;
