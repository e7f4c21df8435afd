//! Database module for PostgreSQL connection and schema metadata
//!
//! This module provides the connection pool and the information_schema
//! backed schema provider.

pub mod connection;
pub mod schema_repo;

pub use connection::{init_pool, DbPool};
pub use schema_repo::PgSchemaProvider;
