//! Prompt Composer
//!
//! Assembles the user prompt for one generation attempt. The `SQL:` line
//! requested in the requirements block is what the extractor looks for.

use crate::dialect::SqlDialect;
use crate::intent::QueryIntent;

pub struct PromptComposer {
    dialect: SqlDialect,
}

/// Inputs shared by every attempt of one request.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub request: &'a str,
    pub schema_context: &'a str,
    pub intent: &'a QueryIntent,
    /// Earlier turns of the conversation, if the caller has any.
    pub prior_context: Option<&'a str>,
}

impl PromptComposer {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are an expert SQL developer specializing in {dialect}. \
             Generate accurate, efficient SQL queries based on natural language requests. \
             Always use proper {dialect} syntax and best practices. \
             Ensure queries are safe and performant.",
            dialect = self.dialect
        )
    }

    pub fn compose(&self, inputs: &PromptInputs<'_>, attempt_index: usize) -> String {
        let mut parts: Vec<String> = Vec::new();

        parts.push("Convert the following natural language query to SQL:".to_string());
        parts.push(format!("Query: \"{}\"", inputs.request));
        parts.push("\nDatabase Schema Context:".to_string());
        parts.push(inputs.schema_context.to_string());

        if let Some(prior) = inputs.prior_context.filter(|p| !p.trim().is_empty()) {
            parts.push("\nConversation Context:".to_string());
            parts.push(prior.trim().to_string());
        }

        if inputs.intent.has_aggregation {
            parts.push("\nNote: This query requires aggregation functions (SUM, COUNT, AVG, etc.)".to_string());
        }
        if inputs.intent.has_joins {
            parts.push("Note: This query likely requires table joins".to_string());
        }
        if inputs.intent.has_date_filter {
            parts.push("Note: This query involves date/time filtering".to_string());
        }

        if attempt_index > 0 {
            parts.push(format!(
                "\nThis is retry attempt #{}. Please ensure the SQL is valid and executable.",
                attempt_index + 1
            ));
        }

        parts.push("\nRequirements:".to_string());
        parts.push(format!("1. Generate valid {} syntax", self.dialect));
        parts.push("2. Use proper table and column names from the schema".to_string());
        parts.push("3. Include appropriate WHERE clauses for filters".to_string());
        parts.push(format!("4. {}", self.dialect.limit_requirement()));
        parts.push("5. Format the response as: SQL: [your query here]".to_string());
        parts.push("6. Provide a brief explanation after the SQL".to_string());

        parts.join("\n")
    }
}
