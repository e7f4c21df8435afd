//! Environment-driven configuration.
//!
//! Values come from the process environment after `.env` has been loaded.

use crate::dialect::SqlDialect;
use crate::error::{NlSqlError, Result};
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct Config {
    // Database
    pub database_url: Option<String>,
    pub db_server: String,
    pub db_port: u16,
    pub db_database: String,
    pub db_username: String,
    pub db_password: String,
    pub default_schema: String,

    // Completion service
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_max_tokens: u32,
    pub openai_timeout_secs: u64,
    pub max_retry_attempts: usize,
    pub sql_dialect: SqlDialect,

    // Server
    pub server_name: String,
    pub bind_addr: String,
    pub log_level: String,

    // Query limits
    pub max_query_results: usize,
    pub query_timeout_secs: u64,
    pub schema_cache_ttl_secs: u64,

    // Security
    pub select_only_mode: bool,
    pub allow_mode_toggle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_server: "localhost".to_string(),
            db_port: 5432,
            db_database: String::new(),
            db_username: String::new(),
            db_password: String::new(),
            default_schema: "public".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_max_tokens: 2000,
            openai_timeout_secs: 60,
            max_retry_attempts: 2,
            sql_dialect: SqlDialect::default(),
            server_name: "natural-language-sql-server".to_string(),
            bind_addr: "127.0.0.1:8080".to_string(),
            log_level: "INFO".to_string(),
            max_query_results: 100,
            query_timeout_secs: 30,
            schema_cache_ttl_secs: 300,
            select_only_mode: false,
            allow_mode_toggle: true,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_server: text("DB_SERVER", &defaults.db_server),
            db_port: parse_var(&lookup, "DB_PORT", defaults.db_port)?,
            db_database: text("DB_DATABASE", ""),
            db_username: text("DB_USERNAME", ""),
            db_password: text("DB_PASSWORD", ""),
            default_schema: text("DEFAULT_SCHEMA", &defaults.default_schema),
            openai_api_key: text("OPENAI_API_KEY", ""),
            openai_model: text("OPENAI_MODEL", &defaults.openai_model),
            openai_base_url: text("OPENAI_BASE_URL", &defaults.openai_base_url),
            openai_max_tokens: parse_var(&lookup, "OPENAI_MAX_TOKENS", defaults.openai_max_tokens)?,
            openai_timeout_secs: parse_var(&lookup, "OPENAI_TIMEOUT_SECS", defaults.openai_timeout_secs)?,
            max_retry_attempts: parse_var(&lookup, "MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts)?,
            sql_dialect: parse_var(&lookup, "SQL_DIALECT", defaults.sql_dialect)?,
            server_name: text("MCP_SERVER_NAME", &defaults.server_name),
            bind_addr: text("SERVER_BIND_ADDR", &defaults.bind_addr),
            log_level: text("LOG_LEVEL", &defaults.log_level),
            max_query_results: parse_var(&lookup, "MAX_QUERY_RESULTS", defaults.max_query_results)?,
            query_timeout_secs: parse_var(&lookup, "QUERY_TIMEOUT", defaults.query_timeout_secs)?,
            schema_cache_ttl_secs: parse_var(&lookup, "SCHEMA_CACHE_TTL_SECS", defaults.schema_cache_ttl_secs)?,
            select_only_mode: parse_flag(&lookup, "SELECT_ONLY_MODE", defaults.select_only_mode)?,
            allow_mode_toggle: parse_flag(&lookup, "ALLOW_MODE_TOGGLE", defaults.allow_mode_toggle)?,
        })
    }

    /// Postgres connect options, parsed from `DATABASE_URL` or built from the `DB_*` parts.
    ///
    /// Parts are set field by field, so credentials may contain URL
    /// delimiters such as `/`, `#`, `@` or `:`.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.database_url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| NlSqlError::Configuration(format!("DATABASE_URL is invalid: {}", e)));
        }
        if self.db_server.is_empty() {
            return Err(NlSqlError::Configuration("DB_SERVER is required".to_string()));
        }
        if self.db_database.is_empty() {
            return Err(NlSqlError::Configuration("DB_DATABASE is required".to_string()));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.db_server)
            .port(self.db_port)
            .database(&self.db_database);
        if !self.db_username.is_empty() {
            options = options.username(&self.db_username);
        }
        if !self.db_password.is_empty() {
            options = options.password(&self.db_password);
        }
        Ok(options)
    }

    /// Fail fast on settings no request could succeed without.
    pub fn validate(&self) -> Result<()> {
        self.connect_options()?;
        if self.openai_api_key.is_empty() {
            warn!("OPENAI_API_KEY not set - natural language processing will be disabled");
        }
        if self.max_query_results == 0 {
            return Err(NlSqlError::Configuration("MAX_QUERY_RESULTS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.openai_api_key.is_empty()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.db_server)
            .field("database", &self.db_database)
            .field("has_database_url", &self.database_url.is_some())
            .field("model", &self.openai_model)
            .field("dialect", &self.sql_dialect)
            .field("has_openai_key", &self.has_api_key())
            .field("select_only_mode", &self.select_only_mode)
            .field("allow_mode_toggle", &self.allow_mode_toggle)
            .finish()
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            NlSqlError::Configuration(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(NlSqlError::Configuration(format!(
                "{} must be true or false, got '{}'",
                key, other
            ))),
        },
    }
}
