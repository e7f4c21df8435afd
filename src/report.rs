//! Markdown reports shared by the CLI and the server.

use crate::error::NlSqlError;
use crate::execution::{ExecutionOutcome, Row, RowSet};
use crate::safety::ModeChange;
use crate::service::{AskResponse, SampleData, TableDetails, TableListing};

const ASK_PREVIEW_ROWS: usize = 10;
const DIRECT_PREVIEW_ROWS: usize = 20;
const MAX_REPORTED_SUGGESTIONS: usize = 3;

pub fn render_ask(response: &AskResponse, row_cap: usize) -> String {
    let conversion = &response.conversion;
    let mut sections = vec![
        format!("**Natural Language Query:** {}", conversion.natural_query),
        format!("**Generated SQL:**\n```sql\n{}\n```", conversion.sql),
    ];

    if !conversion.explanation.is_empty() {
        sections.push(format!("**Query Analysis:** {}", conversion.explanation));
    }

    match &response.execution {
        ExecutionOutcome::Rows(rows) => {
            sections.push(format!(
                "**Results:** Found {} records (executed in {:.2}s)",
                rows.row_count, rows.execution_time
            ));
            if rows.row_count > 0 {
                sections.push("**Sample Data:**".to_string());
                sections.push(json_block(&rows.data, ASK_PREVIEW_ROWS));
                if rows.row_count > ASK_PREVIEW_ROWS {
                    sections.push(format!(
                        "*(Showing first {} of {} records)*",
                        ASK_PREVIEW_ROWS, rows.row_count
                    ));
                }
                if rows.limited {
                    sections.push(format!("⚠️ *Results were limited to {} records*", row_cap));
                }
            }
        }
        ExecutionOutcome::Affected(summary) => {
            sections.push(format!("**Result:** {}", summary.message));
        }
    }

    if !conversion.suggestions.is_empty() {
        let mut block = vec!["**Suggestions:**".to_string()];
        block.extend(
            conversion
                .suggestions
                .iter()
                .take(MAX_REPORTED_SUGGESTIONS)
                .map(|s| format!("- {}", s)),
        );
        sections.push(block.join("\n"));
    }

    if !conversion.warnings.is_empty() {
        let mut block = vec!["**Warnings:**".to_string()];
        block.extend(conversion.warnings.iter().map(|w| format!("- ⚠️ {}", w)));
        sections.push(block.join("\n"));
    }

    sections.join("\n\n")
}

pub fn render_direct(sql: &str, outcome: &ExecutionOutcome) -> String {
    let mut sections = vec![format!("**SQL Query:**\n```sql\n{}\n```", sql)];

    match outcome {
        ExecutionOutcome::Rows(rows) => {
            sections.push(format!(
                "**Results:** {} records (executed in {:.2}s)",
                rows.row_count, rows.execution_time
            ));
            if rows.row_count > 0 {
                sections.push("**Data:**".to_string());
                sections.push(json_block(&rows.data, DIRECT_PREVIEW_ROWS));
                if rows.row_count > DIRECT_PREVIEW_ROWS {
                    sections.push(format!(
                        "*(Showing first {} of {} records)*",
                        DIRECT_PREVIEW_ROWS, rows.row_count
                    ));
                }
            }
        }
        ExecutionOutcome::Affected(summary) => {
            sections.push(format!("**Result:** {}", summary.message));
        }
    }

    sections.join("\n\n")
}

pub fn render_table_info(details: &TableDetails) -> String {
    let mut lines = vec![format!("**Table:** {}.{}", details.schema, details.table)];

    if !details.columns.is_empty() {
        lines.push(format!("**Columns:** ({} total)", details.columns.len()));
        lines.push("```".to_string());
        for column in &details.columns {
            let pk = if column.is_primary_key { "🔑 " } else { "" };
            let fk = if column.is_foreign_key { "🔗 " } else { "" };
            let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
            lines.push(format!(
                "{}{}{}: {} {}",
                pk,
                fk,
                column.name,
                column.type_label(),
                nullable
            ));
        }
        lines.push("```".to_string());
    }

    lines.join("\n")
}

pub fn render_table_list(listing: &TableListing) -> String {
    if listing.total == 0 {
        return "No tables found in the database.".to_string();
    }

    let mut lines = vec![format!("**Database Tables:** ({} total)", listing.total), String::new()];
    for group in &listing.schemas {
        lines.push(format!("**Schema: {}**", group.schema));
        lines.extend(group.tables.iter().map(|t| format!("- {}", t)));
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn render_sample(sample: &SampleData) -> String {
    let mut lines = vec![format!("**Sample Data from {}.{}:**", sample.schema, sample.table)];
    let rows: &RowSet = &sample.rows;

    if rows.data.is_empty() {
        lines.push("No data found in the table.".to_string());
    } else {
        lines.push(format!(
            "**Records:** {} of {} requested",
            rows.data.len(),
            sample.requested
        ));
        lines.push(json_block(&rows.data, rows.data.len()));
    }

    lines.join("\n")
}

/// Mode toggle confirmation. A one-shot CLI process loses the change on exit.
pub fn render_mode_change(change: &ModeChange, process_lifetime_only: bool) -> String {
    if process_lifetime_only {
        format!(
            "{}\nNote: this change only lasts for this invocation. \
             Use POST /api/mode on a running server, or set SELECT_ONLY_MODE, to keep it.",
            change.message
        )
    } else {
        change.message.clone()
    }
}

pub fn render_error(error: &NlSqlError) -> String {
    match error {
        NlSqlError::SafetyViolation(reason) => format!("❌ **Blocked:** {}", reason),
        other => format!("❌ **Error:** {}", other),
    }
}

fn json_block(rows: &[Row], limit: usize) -> String {
    let preview: Vec<&Row> = rows.iter().take(limit).collect();
    let body = serde_json::to_string_pretty(&preview).unwrap_or_else(|_| "[]".to_string());
    format!("```json\n{}\n```", body)
}
