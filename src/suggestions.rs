//! Suggestion Engine
//!
//! Heuristic hints for sharpening a request or a generated statement.
//! Purely advisory.

pub const MAX_SUGGESTIONS: usize = 5;
const SLOW_QUERY_SECS: f64 = 5.0;

pub struct SuggestionEngine;

impl SuggestionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Hints for the request text, in check order, at most five.
    pub fn for_request(&self, request: &str) -> Vec<String> {
        let text = request.to_lowercase();
        let mut suggestions = Vec::new();

        if text.contains("all") && text.contains("customer") {
            suggestions.push("Consider adding specific filters to limit results".to_string());
        }
        if text.contains("last") || text.contains("recent") {
            suggestions.push("You might want to specify a time range (e.g., 'last 30 days')".to_string());
        }
        if text.contains("best") || text.contains("top") {
            suggestions.push("Consider specifying how many results you want (e.g., 'top 10')".to_string());
        }
        if text.contains("compare") || text.contains(" vs ") || text.contains("versus") {
            suggestions.push("Name the groups or periods being compared (e.g., '2023 vs 2024')".to_string());
        }
        if text.contains("each") || text.contains(" per ") {
            suggestions.push("Say which column to group by (e.g., 'per region')".to_string());
        }

        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }

    /// Hints for a statement, optionally informed by how long it took to run.
    pub fn optimizations(&self, sql: &str, execution_time_secs: Option<f64>) -> Vec<String> {
        let upper = sql.to_uppercase();
        let mut suggestions = Vec::new();

        if upper.contains("SELECT *") {
            suggestions.push("Consider selecting only needed columns instead of using SELECT *".to_string());
        }
        if !upper.contains("ORDER BY") && (upper.contains("TOP") || upper.contains("LIMIT")) {
            suggestions.push("Consider adding ORDER BY clause when using TOP or LIMIT".to_string());
        }
        if upper.matches("JOIN").count() > 3 {
            suggestions.push("Query has multiple joins - consider if all are necessary".to_string());
        }
        if execution_time_secs.map_or(false, |t| t > SLOW_QUERY_SECS) {
            suggestions.push(
                "Query execution time is high - consider adding indexes or optimizing joins".to_string(),
            );
        }

        suggestions
    }
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_hints_follow_check_order() {
        let hints = SuggestionEngine::new().for_request("Show all customers from the last month");
        assert_eq!(hints.len(), 2);
        assert!(hints[0].contains("filters"));
        assert!(hints[1].contains("time range"));
    }

    #[test]
    fn test_request_hints_capped_at_five() {
        let hints = SuggestionEngine::new()
            .for_request("compare the top recent customer totals for all regions, each quarter versus last");
        assert_eq!(hints.len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn test_no_hints_for_precise_request() {
        assert!(SuggestionEngine::new().for_request("count orders placed in 2024").is_empty());
    }

    #[test]
    fn test_statement_optimizations() {
        let engine = SuggestionEngine::new();
        let hints = engine.optimizations(
            "SELECT * FROM a JOIN b ON 1=1 JOIN c ON 1=1 JOIN d ON 1=1 JOIN e ON 1=1 LIMIT 5",
            Some(7.5),
        );
        assert_eq!(hints.len(), 4);
        assert!(engine
            .optimizations("SELECT TOP 5 name FROM t ORDER BY name", None)
            .is_empty());
    }
}
