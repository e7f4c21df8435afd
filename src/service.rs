//! NL→SQL service
//!
//! Wires the pipeline together: schema snapshot → intent → context →
//! generation loop → advisory pass, and the safety gate in front of every
//! execution. Both binaries drive the crate through this type.

use crate::config::Config;
use crate::db::{init_pool, PgSchemaProvider};
use crate::error::{NlSqlError, Result};
use crate::execution::{ExecutionOutcome, PgQueryExecutor, QueryExecutor, RowSet};
use crate::generation_loop::GenerationRetryController;
use crate::intent::{IntentClassifier, Operation};
use crate::llm::{ChatMessage, CompletionRequest, CompletionService, LlmClient};
use crate::prompt::{PromptComposer, PromptInputs};
use crate::safety::gate::truncate;
use crate::safety::{ModeChange, ModeController, ModeStatus, SafetyGate, SafetyMode};
use crate::schema::{ColumnInfo, SchemaCache, SchemaContextBuilder, SchemaProvider, SchemaSnapshot};
use crate::suggestions::SuggestionEngine;
use crate::validation::AdvisoryValidator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub const MAX_SAMPLE_SIZE: i64 = 20;
pub const DEFAULT_SAMPLE_SIZE: i64 = 5;

const EXPLAIN_TEMPERATURE: f32 = 0.3;
const EXPLAIN_MAX_TOKENS: u32 = 500;

/// A statement generated for a request, with its advisory findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub natural_query: String,
    pub sql: String,
    pub operation: Operation,
    pub confidence: f64,
    pub explanation: String,
    pub attempts: usize,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub conversion: Conversion,
    pub execution: ExecutionOutcome,
    /// Hints derived from the statement and its run time.
    pub optimizations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGroup {
    pub schema: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListing {
    pub total: usize,
    pub schemas: Vec<SchemaGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDetails {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub schema: String,
    pub table: String,
    pub requested: i64,
    pub rows: RowSet,
}

pub struct NlSqlService {
    config: Arc<Config>,
    completion: Arc<dyn CompletionService>,
    executor: Arc<dyn QueryExecutor>,
    schema: Arc<dyn SchemaProvider>,
    gate: SafetyGate,
    cache: SchemaCache,
    classifier: IntentClassifier,
    composer: PromptComposer,
    context_builder: SchemaContextBuilder,
    validator: AdvisoryValidator,
    suggestions: SuggestionEngine,
}

impl NlSqlService {
    pub fn new(
        config: Config,
        completion: Arc<dyn CompletionService>,
        executor: Arc<dyn QueryExecutor>,
        schema: Arc<dyn SchemaProvider>,
    ) -> Self {
        let mode = Arc::new(ModeController::new(
            SafetyMode::from_select_only(config.select_only_mode),
            config.allow_mode_toggle,
        ));
        let dialect = config.sql_dialect;
        let cache = SchemaCache::new(config.schema_cache_ttl());

        Self {
            config: Arc::new(config),
            completion,
            executor,
            schema,
            gate: SafetyGate::new(mode),
            cache,
            classifier: IntentClassifier::new(),
            composer: PromptComposer::new(dialect),
            context_builder: SchemaContextBuilder::new(dialect),
            validator: AdvisoryValidator::new(),
            suggestions: SuggestionEngine::new(),
        }
    }

    /// Build the service over PostgreSQL and the OpenAI-compatible client.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = init_pool(config.connect_options()?).await?;

        let completion = Arc::new(LlmClient::from_config(&config)?);
        let executor = Arc::new(PgQueryExecutor::new(
            pool.clone(),
            config.max_query_results,
            config.query_timeout(),
        ));
        let schema = Arc::new(PgSchemaProvider::new(pool));

        info!("✅ Service ready ({}, model {})", config.sql_dialect, config.openai_model);
        Ok(Self::new(config, completion, executor, schema))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    /// Snapshot from the cache, reloading when stale.
    pub async fn schema_snapshot(&self) -> Result<Arc<SchemaSnapshot>> {
        self.cache.get_or_load(self.schema.as_ref()).await
    }

    pub fn invalidate_schema(&self) {
        self.cache.invalidate();
    }

    /// Turn a request into a statement. Nothing is executed.
    pub async fn convert(&self, query: &str, context: Option<&str>) -> Result<Conversion> {
        let span = info_span!("convert", request_id = %Uuid::new_v4());
        self.convert_inner(query, context).instrument(span).await
    }

    async fn convert_inner(&self, query: &str, context: Option<&str>) -> Result<Conversion> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NlSqlError::InvalidInput("Natural language query is required".to_string()));
        }
        if !self.completion.is_configured() {
            return Err(NlSqlError::Configuration(
                "OpenAI API key not configured for natural language processing".to_string(),
            ));
        }

        info!("🔍 Converting: {}", truncate(query, 100));
        let snapshot = self.schema_snapshot().await?;
        let intent = self.classifier.classify(query);
        let schema_context = self.context_builder.build(&snapshot, &intent);

        let inputs = PromptInputs {
            request: query,
            schema_context: &schema_context,
            intent: &intent,
            prior_context: context,
        };
        let controller = GenerationRetryController::new(
            self.completion.as_ref(),
            &self.composer,
            self.config.max_retry_attempts,
        );
        let accepted = controller.generate(&inputs).await.into_result()?;

        let report = self.validator.review(&accepted.sql, &snapshot);
        let suggestions = self.suggestions.for_request(query);

        Ok(Conversion {
            natural_query: query.to_string(),
            sql: accepted.sql,
            operation: intent.operation,
            confidence: accepted.confidence,
            explanation: accepted.explanation,
            attempts: accepted.attempts,
            warnings: report.warnings,
            suggestions,
            generated_at: Utc::now(),
        })
    }

    /// Convert, gate and execute.
    pub async fn ask(&self, query: &str, include_explanation: bool) -> Result<AskResponse> {
        let span = info_span!("ask", request_id = %Uuid::new_v4());
        async move {
            let mut conversion = self.convert_inner(query, None).await?;
            if !include_explanation {
                conversion.explanation.clear();
            }

            let execution = self.run_gated(&conversion.sql).await?;
            let optimizations = self
                .suggestions
                .optimizations(&conversion.sql, Some(execution.execution_time()));

            Ok(AskResponse {
                conversion,
                execution,
                optimizations,
            })
        }
        .instrument(span)
        .await
    }

    /// Gate and execute a caller-written statement.
    pub async fn execute_sql(&self, sql: &str) -> Result<ExecutionOutcome> {
        let span = info_span!("execute_sql", request_id = %Uuid::new_v4());
        async move {
            let sql = sql.trim();
            if sql.is_empty() {
                return Err(NlSqlError::InvalidInput("SQL query is required".to_string()));
            }
            info!("Executing direct SQL: {}", truncate(sql, 100));
            self.run_gated(sql).await
        }
        .instrument(span)
        .await
    }

    async fn run_gated(&self, sql: &str) -> Result<ExecutionOutcome> {
        let verdict = self.gate.check(sql);
        if !verdict.is_valid {
            return Err(NlSqlError::SafetyViolation(verdict.message));
        }

        self.executor.execute(sql, &[]).await.map_err(|e| {
            error!("Query execution failed: {}", e);
            e
        })
    }

    /// Base tables grouped by schema, names sorted within each group.
    pub async fn list_tables(&self) -> Result<TableListing> {
        let tables = self.schema.list_tables().await?;
        let mut schemas: Vec<SchemaGroup> = Vec::new();

        for table in &tables {
            match schemas.iter_mut().find(|g| g.schema == table.schema) {
                Some(group) => group.tables.push(table.name.clone()),
                None => schemas.push(SchemaGroup {
                    schema: table.schema.clone(),
                    tables: vec![table.name.clone()],
                }),
            }
        }
        for group in &mut schemas {
            group.tables.sort();
        }

        Ok(TableListing {
            total: tables.len(),
            schemas,
        })
    }

    pub async fn table_info(&self, table: &str, schema: Option<&str>) -> Result<TableDetails> {
        let table = table.trim();
        if table.is_empty() {
            return Err(NlSqlError::InvalidInput("Table name is required".to_string()));
        }
        let schema = self.schema_or_default(schema);
        info!("Retrieving table information for: {}.{}", schema, table);

        let columns = self.schema.table_columns(table, &schema).await?;
        Ok(TableDetails {
            schema,
            table: table.to_string(),
            columns,
        })
    }

    /// First rows of a table. The generated statement still passes the gate.
    pub async fn sample_data(&self, table: &str, size: i64, schema: Option<&str>) -> Result<SampleData> {
        let table = table.trim();
        if table.is_empty() {
            return Err(NlSqlError::InvalidInput("Table name is required".to_string()));
        }
        let schema = self.schema_or_default(schema);
        if !is_plain_identifier(table) || !is_plain_identifier(&schema) {
            return Err(NlSqlError::InvalidInput("Invalid table name format".to_string()));
        }

        let size = size.clamp(1, MAX_SAMPLE_SIZE);
        info!("Retrieving sample data from: {}.{} (sample size: {})", schema, table, size);

        let sql = format!("SELECT * FROM \"{}\".\"{}\" LIMIT {}", schema, table, size);
        match self.run_gated(&sql).await? {
            ExecutionOutcome::Rows(rows) => Ok(SampleData {
                schema,
                table: table.to_string(),
                requested: size,
                rows,
            }),
            ExecutionOutcome::Affected(_) => Err(NlSqlError::Execution(
                "Sample query did not return rows".to_string(),
            )),
        }
    }

    /// Plain-language explanation of a statement. Single call, no retry.
    pub async fn explain_sql(&self, sql: &str) -> Result<String> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(NlSqlError::InvalidInput("SQL query is required".to_string()));
        }
        if !self.completion.is_configured() {
            return Err(NlSqlError::Configuration(
                "OpenAI API key required for SQL explanation".to_string(),
            ));
        }

        let prompt = format!(
            "Explain this SQL query in simple terms:\n\n{}\n\nPlease provide:\n\
             1. What the query does\n\
             2. Which tables it accesses\n\
             3. What conditions it applies\n\
             4. What data it returns",
            sql
        );
        let request = CompletionRequest {
            model: self.completion.model().to_string(),
            messages: vec![
                ChatMessage::system("You are a SQL expert who explains queries clearly."),
                ChatMessage::user(prompt),
            ],
            max_tokens: EXPLAIN_MAX_TOKENS,
            temperature: EXPLAIN_TEMPERATURE,
            top_p: None,
        };

        let text = self.completion.complete(&request).await?;
        Ok(text.trim().to_string())
    }

    pub fn optimizations(&self, sql: &str, execution_time_secs: Option<f64>) -> Vec<String> {
        self.suggestions.optimizations(sql, execution_time_secs)
    }

    pub fn set_mode(&self, select_only: bool) -> Result<ModeChange> {
        self.gate.mode().set_select_only(select_only)
    }

    pub fn get_mode(&self) -> ModeStatus {
        self.gate.mode().status()
    }

    fn schema_or_default(&self, schema: Option<&str>) -> String {
        schema
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_schema)
            .to_string()
    }
}

/// Letters, digits, `_` and `-` only.
fn is_plain_identifier(name: &str) -> bool {
    let stripped: String = name.chars().filter(|c| *c != '_' && *c != '-').collect();
    !stripped.is_empty() && stripped.chars().all(char::is_alphanumeric)
}
