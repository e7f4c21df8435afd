//! Tracing subscriber setup for the binaries.

use tracing_subscriber::EnvFilter;

/// Log to stderr. `RUST_LOG` wins; otherwise the configured level applies.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(log_level)));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Accepts `WARNING` and `CRITICAL` alongside the tracing level names.
fn directive_for(log_level: &str) -> &'static str {
    match log_level.trim().to_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(directive_for("WARNING"), "warn");
        assert_eq!(directive_for("critical"), "error");
        assert_eq!(directive_for("nonsense"), "info");
    }
}
