use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{format_api_error, transport_error};
use crate::{ContentBlock, LlmProvider, LlmRequest, LlmResponse};

const TIMEOUT_SECS: u64 = 120;

/// Anthropic Messages API client.
///
/// Structured output is requested by exposing the response schema as a single
/// tool and forcing the model to call it.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn to_api_request(request: LlmRequest) -> ApiRequest {
        let mut tools: Vec<ApiToolDef> = request
            .tools
            .into_iter()
            .map(|t| ApiToolDef {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect();

        let tool_choice = request.response_format.map(|format| {
            let choice = ApiToolChoice {
                choice_type: "tool".to_string(),
                name: format.name.clone(),
            };
            tools.push(ApiToolDef {
                name: format.name,
                description: format.description,
                input_schema: format.schema,
            });
            choice
        });

        ApiRequest {
            model: request.model,
            system: request.system,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: request
                .messages
                .into_iter()
                .map(|m| {
                    let has_non_text = m
                        .content
                        .iter()
                        .any(|b| !matches!(b, ContentBlock::Text { .. }));
                    let content = if has_non_text {
                        serde_json::to_value(&m.content).unwrap_or(serde_json::Value::Null)
                    } else {
                        serde_json::Value::String(m.text())
                    };
                    ApiMessage {
                        role: m.role,
                        content,
                    }
                })
                .collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/messages", self.api_base);
        let payload = Self::to_api_request(request);
        tracing::debug!(model = %payload.model, forced_tool = payload.tool_choice.is_some(), "anthropic request");

        let resp = self
            .client
            .post(url)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e, TIMEOUT_SECS))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiError>(&text)
                .ok()
                .map(|e| (e.error.message, e.error.r#type));
            return Err(format_api_error("anthropic", status, parsed));
        }

        let body: ApiResponse = resp.json().await?;
        Ok(to_llm_response(body))
    }
}

fn to_llm_response(body: ApiResponse) -> LlmResponse {
    let content: Vec<ContentBlock> = body
        .content
        .iter()
        .filter_map(|block| match block.block_type.as_str() {
            "text" => block
                .text
                .as_ref()
                .map(|t| ContentBlock::Text { text: t.clone() }),
            "tool_use" => {
                let id = block.id.as_ref()?.clone();
                let name = block.name.as_ref()?.clone();
                let input = block
                    .input
                    .clone()
                    .unwrap_or(serde_json::Value::Object(Default::default()));
                Some(ContentBlock::ToolUse { id, name, input })
            }
            _ => None,
        })
        .collect();
    let text = body
        .content
        .iter()
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    LlmResponse {
        text,
        content,
        input_tokens: body.usage.as_ref().map(|u| u.input_tokens),
        output_tokens: body.usage.as_ref().map(|u| u.output_tokens),
        stop_reason: body.stop_reason,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ApiToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ApiToolChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiToolChoice {
    #[serde(rename = "type")]
    pub choice_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponse {
    pub content: Vec<ApiContentBlock>,
    pub usage: Option<ApiUsage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LlmMessage, ResponseFormat};

    #[test]
    fn anthropic_new_trims_base() {
        let provider = AnthropicProvider::new("test-key", "https://api.anthropic.com/");
        assert_eq!(provider.api_key, "test-key");
        assert_eq!(provider.api_base, "https://api.anthropic.com");
    }

    #[test]
    fn api_request_serialization_matches_expected_shape() {
        let req = LlmRequest {
            model: "claude-sonnet-4-5".to_string(),
            system: Some("system prompt".to_string()),
            messages: vec![LlmMessage::user("hello")],
            max_tokens: 1024,
            temperature: None,
            tools: vec![],
            response_format: None,
        };
        let value = serde_json::to_value(AnthropicProvider::to_api_request(req)).unwrap();
        let expected = serde_json::json!({
            "model": "claude-sonnet-4-5",
            "system": "system prompt",
            "max_tokens": 1024,
            "messages": [
                { "role": "user", "content": "hello" }
            ]
        });
        assert_eq!(value, expected);
    }

    #[test]
    fn response_format_becomes_forced_tool() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"summary": {"type": "string"}},
            "required": ["summary"]
        });
        let req = LlmRequest::simple("claude".into(), None, "diff these".into())
            .with_response_format(ResponseFormat::new("diff_summary", "Summarize", schema.clone()))
            .with_temperature(0.0);

        let value = serde_json::to_value(AnthropicProvider::to_api_request(req)).unwrap();
        assert_eq!(value["tool_choice"]["type"], "tool");
        assert_eq!(value["tool_choice"]["name"], "diff_summary");
        assert_eq!(value["tools"][0]["name"], "diff_summary");
        assert_eq!(value["tools"][0]["input_schema"], schema);
        assert_eq!(value["temperature"], 0.0);
    }

    #[test]
    fn tool_use_messages_are_sent_as_block_arrays() {
        let req = LlmRequest {
            model: "m".into(),
            system: None,
            messages: vec![LlmMessage {
                role: "user".into(),
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "t1".into(),
                    content: "done".into(),
                    is_error: false,
                }],
            }],
            max_tokens: 100,
            temperature: None,
            tools: vec![],
            response_format: None,
        };
        let api = AnthropicProvider::to_api_request(req);
        assert!(api.messages[0].content.is_array());
        assert_eq!(api.messages[0].content[0]["type"], "tool_result");
    }

    #[test]
    fn api_response_with_tool_use_maps_content() {
        let raw = serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "idea_report", "input": {"category": "SaaS"}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 34},
            "stop_reason": "tool_use"
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let resp = to_llm_response(parsed);
        assert_eq!(resp.text, "");
        assert_eq!(
            resp.tool_input("idea_report"),
            Some(&serde_json::json!({"category": "SaaS"}))
        );
        assert_eq!(resp.input_tokens, Some(12));
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn api_error_deserialization_works() {
        let raw = serde_json::json!({
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "message": "messages: field required"
            }
        });
        let parsed: ApiError = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.error.r#type, "invalid_request_error");
        assert_eq!(parsed.error.message, "messages: field required");
    }

    #[tokio::test]
    #[ignore]
    async fn integration_real_api_call() {
        let api_key = match std::env::var("ANTHROPIC_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => api_key,
            _ => return,
        };
        let provider = AnthropicProvider::new(api_key, "https://api.anthropic.com");
        let request = LlmRequest::simple(
            "claude-3-5-haiku-latest".to_string(),
            Some("Reply with exactly: pong".to_string()),
            "ping".to_string(),
        );
        let response = provider.chat(request).await.unwrap();
        assert!(!response.text.trim().is_empty());
    }
}
