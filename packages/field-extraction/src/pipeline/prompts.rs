//! LLM prompts for field extraction.

use crate::types::request::{Schema, TableRow};

/// System prompt for structured field extraction.
pub const EXTRACT_FIELDS_PROMPT: &str = "Extract structured data from document text. \
Return only valid JSON mapping field names to values.\n\
Use null for missing values.";

/// Truncate `text` to at most `max_chars` chars, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Format the user message for an extraction call.
///
/// The schema is rendered as pretty JSON in field order; tables are only
/// appended when there are any.
pub fn format_field_prompt(label: &str, schema: &Schema, text: &str, tables: &[TableRow]) -> String {
    let schema_json =
        serde_json::to_string_pretty(schema.as_map()).unwrap_or_else(|_| "{}".to_string());

    let mut content = format!("Label: {}\nFields:\n{}\nText:\n{}\n", label, schema_json, text);

    if !tables.is_empty() {
        let tables_json = serde_json::to_string_pretty(tables).unwrap_or_else(|_| "[]".to_string());
        content.push_str(&format!("\nExtracted tables (rows):\n{}\n", tables_json));
    }

    content
}
