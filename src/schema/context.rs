//! Schema Context Builder
//!
//! Renders a bounded text view of the schema for the generation prompt.
//! Output size is independent of how large the database is, and ordering
//! follows the snapshot so the same snapshot always renders the same text.

use crate::dialect::SqlDialect;
use crate::intent::QueryIntent;
use crate::schema::SchemaSnapshot;

pub const MAX_LISTED_TABLES: usize = 10;
pub const MAX_DATA_COLUMNS: usize = 15;
pub const MAX_RELATIONSHIPS: usize = 10;

pub struct SchemaContextBuilder {
    dialect: SqlDialect,
}

impl SchemaContextBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn build(&self, snapshot: &SchemaSnapshot, intent: &QueryIntent) -> String {
        let mut sections: Vec<String> = Vec::new();

        sections.push(format!("Query Operation Type: {}", intent.operation));

        if !snapshot.tables.is_empty() {
            sections.push("\nMost Relevant Database Tables:".to_string());
            for table in snapshot.tables.iter().take(MAX_LISTED_TABLES) {
                sections.push(format!("- {}", table.name));
            }
        }

        if !snapshot.table_details.is_empty() {
            sections.push("\nDetailed Schema Information:".to_string());

            for detail in &snapshot.table_details {
                sections.push(format!("\nTable: {}", detail.table));

                let (keys, data): (Vec<_>, Vec<_>) =
                    detail.columns.iter().partition(|c| c.is_key());

                if !keys.is_empty() {
                    sections.push("  Key Columns:".to_string());
                    sections.extend(keys.iter().map(|c| format!("    {}", c.describe())));
                }

                if !data.is_empty() {
                    sections.push("  Data Columns:".to_string());
                    sections.extend(
                        data.iter()
                            .take(MAX_DATA_COLUMNS)
                            .map(|c| format!("    {}", c.describe())),
                    );
                }
            }
        }

        if !snapshot.relationships.is_empty() {
            sections.push("\nTable Relationships:".to_string());
            for rel in snapshot.relationships.iter().take(MAX_RELATIONSHIPS) {
                sections.push(format!(
                    "- {}.{} -> {}.{}",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                ));
            }
        }

        sections.push(format!("\n{} Best Practices:", self.dialect));
        sections.extend(self.dialect.best_practices().iter().map(|s| s.to_string()));

        sections.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Operation, QueryIntent};
    use crate::schema::{ColumnInfo, Relationship, TableColumns, TableInfo};

    fn table(name: &str) -> TableInfo {
        TableInfo {
            schema: "dbo".to_string(),
            name: name.to_string(),
            table_type: "BASE TABLE".to_string(),
            description: String::new(),
        }
    }

    fn column(name: &str, pk: bool, fk: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: "int".to_string(),
            nullable: false,
            max_length: None,
            is_primary_key: pk,
            is_foreign_key: fk,
        }
    }

    #[test]
    fn test_lists_first_ten_tables_in_snapshot_order() {
        // reverse alphabetical to prove no re-sorting
        let names: Vec<String> = (0..12).rev().map(|i| format!("table_{:02}", i)).collect();
        let snapshot = SchemaSnapshot {
            tables: names.iter().map(|n| table(n)).collect(),
            ..Default::default()
        };

        let context = SchemaContextBuilder::new(SqlDialect::SqlServer)
            .build(&snapshot, &QueryIntent::default());

        let listed: Vec<&str> = context
            .lines()
            .filter_map(|l| l.strip_prefix("- table_"))
            .collect();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0], "11");
        assert_eq!(listed[9], "02");
        assert!(!context.contains("table_01"));
        assert!(!context.contains("table_00"));
    }

    #[test]
    fn test_key_columns_unbounded_data_columns_capped() {
        let mut columns = vec![column("id", true, false), column("owner_id", false, true)];
        columns.extend((0..20).map(|i| column(&format!("attr_{:02}", i), false, false)));
        let snapshot = SchemaSnapshot {
            tables: vec![table("Widgets")],
            table_details: vec![TableColumns {
                table: "dbo.Widgets".to_string(),
                columns,
            }],
            relationships: vec![],
        };

        let context = SchemaContextBuilder::new(SqlDialect::SqlServer)
            .build(&snapshot, &QueryIntent::default());

        assert!(context.contains("Table: dbo.Widgets"));
        assert!(context.contains("  Key Columns:\n    id (int)\n    owner_id (int)"));
        assert!(context.contains("attr_14 (int)"));
        assert!(!context.contains("attr_15"));
    }

    #[test]
    fn test_relationships_and_dialect_notes() {
        let relationships: Vec<Relationship> = (0..12)
            .map(|i| Relationship {
                from_table: format!("child_{}", i),
                from_column: "parent_id".to_string(),
                to_table: "parent".to_string(),
                to_column: "id".to_string(),
            })
            .collect();
        let snapshot = SchemaSnapshot {
            relationships,
            ..Default::default()
        };
        let intent = QueryIntent {
            operation: Operation::Update,
            ..Default::default()
        };

        let context = SchemaContextBuilder::new(SqlDialect::SqlServer).build(&snapshot, &intent);

        assert!(context.starts_with("Query Operation Type: UPDATE"));
        assert!(context.contains("- child_0.parent_id -> parent.id"));
        assert!(context.contains("child_9.parent_id"));
        assert!(!context.contains("child_10"));
        assert!(context.contains("SQL Server Best Practices:"));
        assert!(context.contains("GETDATE()"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let snapshot = SchemaSnapshot {
            tables: vec![table("A"), table("B")],
            ..Default::default()
        };
        let builder = SchemaContextBuilder::new(SqlDialect::Postgres);
        let intent = QueryIntent::default();
        assert_eq!(builder.build(&snapshot, &intent), builder.build(&snapshot, &intent));
    }
}
