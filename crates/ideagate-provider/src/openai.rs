use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{format_api_error, transport_error};
use crate::{ContentBlock, LlmMessage, LlmProvider, LlmRequest, LlmResponse};

const TIMEOUT_SECS: u64 = 120;

/// OpenAI chat-completions client, also used for compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAiProvider {
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

    pub fn from_env(api_key_env: &str, api_base: impl Into<String>) -> Result<Self> {
        let api_key =
            std::env::var(api_key_env).map_err(|_| anyhow!("{api_key_env} is not set"))?;
        Ok(Self::new(api_key, api_base))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn to_api_request(request: LlmRequest) -> ApiRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .into_iter()
                    .map(|tool| ApiTool {
                        tool_type: "function".to_string(),
                        function: ApiFunctionDef {
                            name: tool.name,
                            description: tool.description,
                            parameters: tool.input_schema,
                        },
                    })
                    .collect(),
            )
        };

        let response_format = request.response_format.map(|format| ApiResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: ApiJsonSchema {
                name: format.name,
                description: format.description,
                schema: format.schema,
            },
        });

        ApiRequest {
            model: request.model,
            messages: to_api_messages(request.system, request.messages),
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            tools,
            response_format,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = Self::to_api_request(request);
        tracing::debug!(model = %payload.model, json_schema = payload.response_format.is_some(), "openai request");

        let resp = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("openai", e, TIMEOUT_SECS))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .ok()
                .map(|e| (e.error.message, e.error.r#type));
            return Err(format_api_error("openai", status, parsed));
        }

        let body: ApiResponse = resp.json().await?;
        to_llm_response(body)
    }
}

fn to_api_messages(system: Option<String>, messages: Vec<LlmMessage>) -> Vec<ApiMessage> {
    let mut result = Vec::new();

    if let Some(system_text) = system {
        result.push(ApiMessage {
            role: "system".to_string(),
            content: Some(system_text),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for message in messages {
        let text = message.text();
        let tool_uses: Vec<ApiToolCall> = message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ApiToolCall {
                    id: id.clone(),
                    call_type: "function".to_string(),
                    function: ApiToolFunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                }),
                _ => None,
            })
            .collect();

        if !text.is_empty() || !tool_uses.is_empty() {
            result.push(ApiMessage {
                role: message.role.clone(),
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls: if tool_uses.is_empty() {
                    None
                } else {
                    Some(tool_uses)
                },
                tool_call_id: None,
            });
        }

        for block in message.content {
            if let ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } = block
            {
                result.push(ApiMessage {
                    role: "tool".to_string(),
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                });
            }
        }
    }

    result
}

fn to_llm_response(body: ApiResponse) -> Result<LlmResponse> {
    let choice = body
        .choices
        .first()
        .ok_or_else(|| anyhow!("openai api error: empty choices"))?;
    let message = &choice.message;

    if let Some(refusal) = message.refusal.as_deref().filter(|r| !r.is_empty()) {
        return Err(anyhow!("openai api error: model refused: {refusal}"));
    }

    let mut content = Vec::new();
    if let Some(text) = &message.content {
        if !text.is_empty() {
            content.push(ContentBlock::Text { text: text.clone() });
        }
    }
    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            let input = serde_json::from_str::<serde_json::Value>(&call.function.arguments)
                .unwrap_or(serde_json::Value::Object(Default::default()));
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input,
            });
        }
    }

    Ok(LlmResponse {
        text: message.content.clone().unwrap_or_default(),
        content,
        input_tokens: body.usage.as_ref().map(|u| u.prompt_tokens),
        output_tokens: body.usage.as_ref().map(|u| u.completion_tokens),
        stop_reason: normalize_finish_reason(choice.finish_reason.clone()),
    })
}

fn normalize_finish_reason(reason: Option<String>) -> Option<String> {
    match reason.as_deref() {
        Some("tool_calls") => Some("tool_use".to_string()),
        Some("stop") => Some("end_turn".to_string()),
        Some("length") => Some("max_tokens".to_string()),
        _ => reason,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ApiResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ApiFunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: ApiJsonSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiJsonSchema {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponse {
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiAssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiAssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ApiToolFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiToolFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResponseFormat, ToolDef};

    #[test]
    fn to_api_request_maps_tools_and_messages() {
        let req = LlmRequest {
            model: "gpt-4o-mini".into(),
            system: None,
            messages: vec![
                LlmMessage::user("hello"),
                LlmMessage {
                    role: "assistant".into(),
                    content: vec![
                        ContentBlock::Text {
                            text: "calling".into(),
                        },
                        ContentBlock::ToolUse {
                            id: "call_1".into(),
                            name: "re_evaluate".into(),
                            input: serde_json::json!({"idea_id": "i1"}),
                        },
                    ],
                },
                LlmMessage {
                    role: "user".into(),
                    content: vec![ContentBlock::ToolResult {
                        tool_use_id: "call_1".into(),
                        content: "done".into(),
                        is_error: false,
                    }],
                },
            ],
            max_tokens: 128,
            temperature: None,
            tools: vec![ToolDef {
                name: "re_evaluate".into(),
                description: "Re-run evaluation".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {"idea_id": {"type": "string"}}
                }),
            }],
            response_format: None,
        };

        let json = serde_json::to_value(OpenAiProvider::to_api_request(req)).unwrap();
        assert!(json["tools"].is_array());
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert!(json["messages"][1]["tool_calls"].is_array());
        assert_eq!(json["messages"][2]["role"], "tool");
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn to_api_request_includes_system_as_first_message() {
        let req = LlmRequest::simple("gpt-4o-mini".into(), Some("be concise".into()), "hi".into());
        let api = OpenAiProvider::to_api_request(req);
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.messages[0].content.as_deref(), Some("be concise"));
    }

    #[test]
    fn response_format_maps_to_json_schema() {
        let schema = serde_json::json!({"type": "object", "required": ["summary"]});
        let req = LlmRequest::simple("gpt-4o".into(), None, "x".into())
            .with_response_format(ResponseFormat::new("diff_summary", "Summary", schema.clone()))
            .with_temperature(0.0);
        let json = serde_json::to_value(OpenAiProvider::to_api_request(req)).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "diff_summary");
        assert_eq!(json["response_format"]["json_schema"]["schema"], schema);
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn api_response_text_only() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {"content": "{\"summary\":\"ok\"}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let resp = to_llm_response(parsed).unwrap();
        assert_eq!(resp.text, "{\"summary\":\"ok\"}");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.output_tokens, Some(3));
    }

    #[test]
    fn api_response_refusal_is_error() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {"content": null, "refusal": "cannot help"},
                "finish_reason": "stop"
            }]
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let err = to_llm_response(parsed).unwrap_err();
        assert!(err.to_string().contains("cannot help"));
    }

    #[test]
    fn api_response_empty_choices_is_error() {
        let parsed: ApiResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(to_llm_response(parsed).is_err());
    }

    #[test]
    fn from_env_missing_key_returns_error() {
        std::env::remove_var("IDEAGATE_OPENAI_KEY_FOR_TEST");
        let result =
            OpenAiProvider::from_env("IDEAGATE_OPENAI_KEY_FOR_TEST", "https://api.openai.com/v1");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("IDEAGATE_OPENAI_KEY_FOR_TEST"));
    }

    #[test]
    fn finish_reason_normalization() {
        assert_eq!(
            normalize_finish_reason(Some("tool_calls".into())).as_deref(),
            Some("tool_use")
        );
        assert_eq!(
            normalize_finish_reason(Some("length".into())).as_deref(),
            Some("max_tokens")
        );
        assert_eq!(normalize_finish_reason(None), None);
    }
}
