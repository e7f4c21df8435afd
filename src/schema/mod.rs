//! Schema metadata model and the provider seam.

pub mod cache;
pub mod context;

pub use cache::SchemaCache;
pub use context::SchemaContextBuilder;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Only this many tables get column details in an assembled snapshot.
pub const DETAILED_TABLE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub table_type: String,
    pub description: String,
}

impl TableInfo {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<i32>,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
}

impl ColumnInfo {
    /// `name (type)` or `name (type(len))`
    pub fn describe(&self) -> String {
        format!("{} ({})", self.name, self.type_label())
    }

    pub fn type_label(&self) -> String {
        match self.max_length {
            Some(len) if len > 0 => format!("{}({})", self.data_type, len),
            _ => self.data_type.clone(),
        }
    }

    pub fn is_key(&self) -> bool {
        self.is_primary_key || self.is_foreign_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// Columns of one table, keyed by its qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// Read-only view of the database structure. All sequences keep provider order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableInfo>,
    pub table_details: Vec<TableColumns>,
    pub relationships: Vec<Relationship>,
}

impl SchemaSnapshot {
    pub fn columns_for(&self, qualified_name: &str) -> Option<&[ColumnInfo]> {
        self.table_details
            .iter()
            .find(|d| d.table.eq_ignore_ascii_case(qualified_name))
            .map(|d| d.columns.as_slice())
    }

    /// Lower-cased bare table names.
    pub fn known_table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.to_lowercase()).collect()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Source of schema metadata (tables, columns, foreign keys).
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// All base tables, ordered by schema then name.
    async fn list_tables(&self) -> Result<Vec<TableInfo>>;

    /// Columns of one table in ordinal order.
    async fn table_columns(&self, table: &str, schema: &str) -> Result<Vec<ColumnInfo>>;

    /// Foreign-key relationships between tables.
    async fn relationships(&self) -> Result<Vec<Relationship>>;
}

/// Assemble a snapshot: every table, details for the first few, all relationships.
pub async fn load_snapshot(provider: &dyn SchemaProvider) -> Result<SchemaSnapshot> {
    let tables = provider.list_tables().await?;

    let mut table_details = Vec::new();
    for table in tables.iter().take(DETAILED_TABLE_LIMIT) {
        match provider.table_columns(&table.name, &table.schema).await {
            Ok(columns) => table_details.push(TableColumns {
                table: table.qualified_name(),
                columns,
            }),
            Err(e) => warn!("Skipping column details for {}: {}", table.qualified_name(), e),
        }
    }

    let relationships = match provider.relationships().await {
        Ok(relationships) => relationships,
        Err(e) => {
            warn!("Relationship lookup failed, continuing without: {}", e);
            Vec::new()
        }
    };

    info!(
        "Loaded schema snapshot: {} tables, {} detailed, {} relationships",
        tables.len(),
        table_details.len(),
        relationships.len()
    );

    Ok(SchemaSnapshot {
        tables,
        table_details,
        relationships,
    })
}
