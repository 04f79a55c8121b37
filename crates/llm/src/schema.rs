//! Structured Output
//!
//! Turns a model's raw text into a typed value. The expected shape is
//! described to the model with the JSON Schema derived from the Rust type.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum number of raw response characters kept in a violation
const RAW_EXCERPT_CHARS: usize = 500;

/// Model output did not conform to the declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation: {message}")]
pub struct SchemaViolation {
    /// Parser or validation message
    pub message: String,
    /// Excerpt of the offending response
    pub raw: String,
}

impl SchemaViolation {
    fn new(message: impl Into<String>, raw: &str) -> Self {
        Self {
            message: message.into(),
            raw: raw.chars().take(RAW_EXCERPT_CHARS).collect(),
        }
    }
}

/// Pretty-printed JSON Schema for `T`.
pub fn schema_text<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// Instructions appended to a rendered prompt for a structured call.
pub fn structured_instructions<T: JsonSchema>() -> String {
    format!(
        "\n\nRespond with a single JSON value that conforms to this JSON Schema. \
         Do not include any other text.\n```json\n{}\n```",
        schema_text::<T>()
    )
}

/// Extract the JSON payload from a response that may contain markdown fences
/// or surrounding prose.
pub fn extract_json(text: &str) -> Option<&str> {
    // Prefer fenced blocks
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip optional language identifier on the first line
        let body = match after_fence.find('\n') {
            Some(nl) => &after_fence[nl + 1..],
            None => after_fence,
        };
        if let Some(end) = body.find("```") {
            let content = body[..end].trim();
            if content.starts_with('{') || content.starts_with('[') {
                return Some(content);
            }
        }
    }

    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse and validate a model response into `T`.
pub fn validate<T: DeserializeOwned>(text: &str) -> Result<T, SchemaViolation> {
    let json = extract_json(text)
        .ok_or_else(|| SchemaViolation::new("response contains no JSON value", text))?;

    serde_json::from_str(json).map_err(|e| SchemaViolation::new(e.to_string(), text))
}
