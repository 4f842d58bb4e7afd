//! Extraction of schema-shaped JSON objects from provider responses.
//!
//! Providers that support forced tool calls return the object as tool input;
//! others return it as text, sometimes wrapped in a markdown code fence.

use thiserror::Error;

use crate::{LlmResponse, ResponseFormat};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructuredOutputError {
    #[error("provider returned empty output")]
    Empty,

    #[error("output is not valid json: {0}")]
    NotJson(String),

    #[error("output is not a json object")]
    NotObject,

    #[error("output is missing required field '{0}'")]
    MissingRequired(String),
}

/// Extract the structured object for `format` from a response.
///
/// Only the top-level `required` list of the schema is checked here; typed
/// deserialization and range validation happen in the caller.
pub fn structured_output(
    response: &LlmResponse,
    format: &ResponseFormat,
) -> Result<serde_json::Value, StructuredOutputError> {
    let value = match response.tool_input(&format.name) {
        Some(input) => input.clone(),
        None => parse_text(&response.text)?,
    };

    let object = value.as_object().ok_or(StructuredOutputError::NotObject)?;
    if let Some(required) = format.schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            match object.get(field) {
                None | Some(serde_json::Value::Null) => {
                    return Err(StructuredOutputError::MissingRequired(field.to_string()))
                }
                Some(_) => {}
            }
        }
    }
    Ok(value)
}

fn parse_text(text: &str) -> Result<serde_json::Value, StructuredOutputError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Err(StructuredOutputError::Empty);
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            // Tolerate prose around a single object.
            let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
                return Err(StructuredOutputError::NotJson(first_err.to_string()));
            };
            if end <= start {
                return Err(StructuredOutputError::NotJson(first_err.to_string()));
            }
            serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| StructuredOutputError::NotJson(e.to_string()))
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentBlock;

    fn format() -> ResponseFormat {
        ResponseFormat::new(
            "diff_summary",
            "short summary",
            serde_json::json!({
                "type": "object",
                "properties": {"summary": {"type": "string"}},
                "required": ["summary"]
            }),
        )
    }

    #[test]
    fn extracts_plain_json_text() {
        let resp = LlmResponse::from_text(r#"{"summary": "Score 60 → 70."}"#);
        let value = structured_output(&resp, &format()).unwrap();
        assert_eq!(value["summary"], "Score 60 → 70.");
    }

    #[test]
    fn extracts_fenced_json() {
        let resp = LlmResponse::from_text("```json\n{\"summary\": \"ok\"}\n```");
        let value = structured_output(&resp, &format()).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let resp = LlmResponse::from_text("Here you go: {\"summary\": \"ok\"} hope it helps");
        assert!(structured_output(&resp, &format()).is_ok());
    }

    #[test]
    fn prefers_matching_tool_input() {
        let resp = LlmResponse {
            text: "not json".into(),
            content: vec![ContentBlock::ToolUse {
                id: "t1".into(),
                name: "diff_summary".into(),
                input: serde_json::json!({"summary": "from tool"}),
            }],
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("tool_use".into()),
        };
        let value = structured_output(&resp, &format()).unwrap();
        assert_eq!(value["summary"], "from tool");
    }

    #[test]
    fn empty_output_is_rejected() {
        let resp = LlmResponse::from_text("   ");
        assert_eq!(structured_output(&resp, &format()), Err(StructuredOutputError::Empty));
    }

    #[test]
    fn non_object_is_rejected() {
        let resp = LlmResponse::from_text("[1, 2, 3]");
        assert_eq!(structured_output(&resp, &format()), Err(StructuredOutputError::NotObject));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let resp = LlmResponse::from_text(r#"{"summary": null}"#);
        assert_eq!(
            structured_output(&resp, &format()),
            Err(StructuredOutputError::MissingRequired("summary".into()))
        );
    }

    #[test]
    fn garbage_is_not_json() {
        let resp = LlmResponse::from_text("no braces here");
        assert!(matches!(
            structured_output(&resp, &format()),
            Err(StructuredOutputError::NotJson(_))
        ));
    }
}
