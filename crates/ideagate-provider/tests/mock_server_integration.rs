use ideagate_provider::{
    structured_output, AnthropicProvider, LlmProvider, LlmRequest, OpenAiProvider,
    ResponseFormat,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn summary_format() -> ResponseFormat {
    ResponseFormat::new(
        "diff_summary",
        "One or two sentences describing what changed",
        serde_json::json!({
            "type": "object",
            "properties": {"summary": {"type": "string"}},
            "required": ["summary"],
            "additionalProperties": false
        }),
    )
}

fn mock_openai_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

#[tokio::test]
async fn openai_structured_request_sends_json_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "temperature": 0.0,
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "diff_summary"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_openai_response(
            "{\"summary\": \"Score 61 → 70. Verdict REFINE → GO.\"}",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let request = LlmRequest::simple("gpt-4o".into(), Some("be terse".into()), "diff".into())
        .with_response_format(summary_format())
        .with_temperature(0.0);
    let resp = provider.chat(request).await.unwrap();

    let value = structured_output(&resp, &summary_format()).unwrap();
    assert_eq!(value["summary"], "Score 61 → 70. Verdict REFINE → GO.");
    assert_eq!(resp.input_tokens, Some(10));
}

#[tokio::test]
async fn openai_server_error_is_marked_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"type": "server_error", "message": "overloaded"}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let err = provider
        .chat(LlmRequest::simple("gpt-4o".into(), None, "hi".into()))
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("503"));
    assert!(text.contains("[retryable]"));
    assert!(text.contains("overloaded"));
}

#[tokio::test]
async fn anthropic_forced_tool_call_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ant-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "tool_choice": {"type": "tool", "name": "diff_summary"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_01",
                "name": "diff_summary",
                "input": {"summary": "Score established at 72."}
            }],
            "usage": {"input_tokens": 40, "output_tokens": 12},
            "stop_reason": "tool_use"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ant-key", server.uri());
    let request = LlmRequest::simple("claude-sonnet-4-5".into(), None, "diff".into())
        .with_response_format(summary_format());
    let resp = provider.chat(request).await.unwrap();

    let value = structured_output(&resp, &summary_format()).unwrap();
    assert_eq!(value["summary"], "Score established at 72.");
    assert_eq!(resp.output_tokens, Some(12));
}

#[tokio::test]
async fn anthropic_invalid_request_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens: required"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ant-key", server.uri());
    let err = provider
        .chat(LlmRequest::simple("claude".into(), None, "hi".into()))
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("invalid_request_error"));
    assert!(!text.contains("[retryable]"));
}
