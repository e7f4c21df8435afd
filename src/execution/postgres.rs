//! PostgreSQL executor
//!
//! Runs gated statements through a sqlx pool. Row values are decoded by
//! column type into JSON; types without a mapping come back as a
//! `<TYPE>` placeholder string.

use crate::error::{NlSqlError, Result};
use crate::execution::engine::{returns_rows, QueryExecutor};
use crate::execution::result::{ExecutionOutcome, Row, RowSet, WriteSummary};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct PgQueryExecutor {
    pool: PgPool,
    max_rows: usize,
    timeout: Duration,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool, max_rows: usize, timeout: Duration) -> Self {
        Self {
            pool,
            max_rows,
            timeout,
        }
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<ExecutionOutcome> {
        let start = Instant::now();

        if returns_rows(sql) {
            let rows = bind_all(sqlx::query(sql), params).fetch_all(&self.pool).await?;
            let execution_time = start.elapsed().as_secs_f64();

            let columns: Vec<String> = rows
                .first()
                .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            let limited = rows.len() > self.max_rows;
            let data: Vec<Row> = rows.iter().take(self.max_rows).map(row_to_json).collect();

            info!("✅ Query returned {} rows in {:.3}s", data.len(), execution_time);
            Ok(ExecutionOutcome::Rows(RowSet {
                row_count: data.len(),
                data,
                columns,
                execution_time,
                limited,
            }))
        } else {
            let done = bind_all(sqlx::query(sql), params).execute(&self.pool).await?;
            let execution_time = start.elapsed().as_secs_f64();
            info!("✅ Statement affected {} rows in {:.3}s", done.rows_affected(), execution_time);
            Ok(ExecutionOutcome::Affected(WriteSummary::new(
                done.rows_affected(),
                execution_time,
            )))
        }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecutionOutcome> {
        debug!("Executing with {} params: {}", params.len(), sql);
        match tokio::time::timeout(self.timeout, self.run(sql, params)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NlSqlError::Timeout {
                seconds: self.timeout.as_secs(),
                detail: "statement did not finish".to_string(),
            }),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(sqlx::types::Json(other)),
        };
    }
    query
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|col| {
            let value = decode_column(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(idx).ok().flatten()
    }

    let value = match type_name {
        "BOOL" => get::<bool>(row, idx).map(Value::from),
        "INT2" => get::<i16>(row, idx).map(Value::from),
        "INT4" => get::<i32>(row, idx).map(Value::from),
        "INT8" => get::<i64>(row, idx).map(Value::from),
        "FLOAT4" => get::<f32>(row, idx).map(Value::from),
        "FLOAT8" => get::<f64>(row, idx).map(Value::from),
        "NUMERIC" => get::<Decimal>(row, idx).map(|d| match d.to_f64() {
            Some(f) => Value::from(f),
            None => Value::String(d.to_string()),
        }),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => get::<String>(row, idx).map(Value::String),
        "TIMESTAMPTZ" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(|t| Value::String(t.to_rfc3339())),
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, idx).map(|t| Value::String(t.to_string())),
        "DATE" => get::<chrono::NaiveDate>(row, idx).map(|d| Value::String(d.to_string())),
        "TIME" => get::<chrono::NaiveTime>(row, idx).map(|t| Value::String(t.to_string())),
        "UUID" => get::<uuid::Uuid>(row, idx).map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        other => {
            // null stays null even for unmapped types
            let is_null = row.try_get_raw(idx).map(|raw| sqlx::ValueRef::is_null(&raw)).unwrap_or(true);
            if is_null {
                None
            } else {
                Some(Value::String(format!("<{}>", other)))
            }
        }
    };
    value.unwrap_or(Value::Null)
}
