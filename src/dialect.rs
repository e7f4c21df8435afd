//! SQL dialect notes fed to the model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Postgres,
    SqlServer,
}

impl SqlDialect {
    pub fn display_name(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "PostgreSQL",
            SqlDialect::SqlServer => "SQL Server",
        }
    }

    /// Fixed best-practice lines appended to every schema context.
    pub fn best_practices(&self) -> &'static [&'static str] {
        match self {
            SqlDialect::Postgres => &[
                "- Use LIMIT n for limiting results in PostgreSQL",
                "- Use NOW() or CURRENT_DATE for current date/time",
                "- Use EXTRACT() or DATE_TRUNC() for date components",
                "- Use CAST() or the :: operator for type conversions",
            ],
            SqlDialect::SqlServer => &[
                "- Use TOP n for limiting results in SQL Server",
                "- Use GETDATE() for current date/time",
                "- Use DATEPART() for date components",
                "- Use CAST() or CONVERT() for type conversions",
            ],
        }
    }

    pub fn limit_requirement(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "Use LIMIT (not TOP) for PostgreSQL",
            SqlDialect::SqlServer => "Use TOP instead of LIMIT for SQL Server",
        }
    }
}

impl Default for SqlDialect {
    fn default() -> Self {
        SqlDialect::Postgres
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "sqlserver" | "mssql" | "sql_server" => Ok(SqlDialect::SqlServer),
            other => Err(format!("unknown SQL dialect '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_aliases() {
        assert_eq!("PostgreSQL".parse::<SqlDialect>().unwrap(), SqlDialect::Postgres);
        assert_eq!("mssql".parse::<SqlDialect>().unwrap(), SqlDialect::SqlServer);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_sql_server_notes_mention_top() {
        assert!(SqlDialect::SqlServer.best_practices()[0].contains("TOP n"));
        assert!(SqlDialect::Postgres.limit_requirement().contains("LIMIT"));
    }
}
