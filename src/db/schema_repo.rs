//! Schema metadata repository backed by PostgreSQL information_schema

use crate::error::{NlSqlError, Result};
use crate::schema::{ColumnInfo, Relationship, SchemaProvider, TableInfo};
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PgSchemaProvider {
    pool: PgPool,
}

impl PgSchemaProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaProvider for PgSchemaProvider {
    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                t.table_schema::text,
                t.table_name::text,
                t.table_type::text,
                COALESCE(
                    obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class'),
                    ''
                ) AS description
            FROM information_schema.tables t
            WHERE t.table_type = 'BASE TABLE'
              AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY t.table_schema, t.table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NlSqlError::Schema(format!("Failed to load tables: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(schema, name, table_type, description)| TableInfo {
                schema,
                name,
                table_type,
                description,
            })
            .collect())
    }

    async fn table_columns(&self, table: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        let rows: Vec<(String, String, bool, Option<i32>, bool, bool)> = sqlx::query_as(
            r#"
            SELECT
                c.column_name::text,
                c.data_type::text,
                (c.is_nullable = 'YES') AS nullable,
                c.character_maximum_length::int4 AS max_length,
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage k
                      ON tc.constraint_name = k.constraint_name
                     AND tc.table_schema = k.table_schema
                    WHERE tc.constraint_type = 'PRIMARY KEY'
                      AND k.table_schema = c.table_schema
                      AND k.table_name = c.table_name
                      AND k.column_name = c.column_name
                ) AS is_primary_key,
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage k
                      ON tc.constraint_name = k.constraint_name
                     AND tc.table_schema = k.table_schema
                    WHERE tc.constraint_type = 'FOREIGN KEY'
                      AND k.table_schema = c.table_schema
                      AND k.table_name = c.table_name
                      AND k.column_name = c.column_name
                ) AS is_foreign_key
            FROM information_schema.columns c
            WHERE c.table_name = $1
              AND c.table_schema = $2
            ORDER BY c.ordinal_position
            "#,
        )
        .bind(table)
        .bind(schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NlSqlError::Schema(format!("Failed to load columns for {}.{}: {}", schema, table, e)))?;

        if rows.is_empty() {
            return Err(NlSqlError::Schema(format!("Table '{}.{}' not found", schema, table)));
        }

        Ok(rows
            .into_iter()
            .map(
                |(name, data_type, nullable, max_length, is_primary_key, is_foreign_key)| ColumnInfo {
                    name,
                    data_type,
                    nullable,
                    max_length,
                    is_primary_key,
                    is_foreign_key,
                },
            )
            .collect())
    }

    async fn relationships(&self) -> Result<Vec<Relationship>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                kcu.table_name::text AS from_table,
                kcu.column_name::text AS from_column,
                ccu.table_name::text AS to_table,
                ccu.column_name::text AS to_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.table_name, kcu.column_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NlSqlError::Schema(format!("Failed to load relationships: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(from_table, from_column, to_table, to_column)| Relationship {
                from_table,
                from_column,
                to_table,
                to_column,
            })
            .collect())
    }
}
