//! Schema-validated generation with bounded retry.
//!
//! Only output-validation failures are retried, immediately and without
//! backoff. Each retry repeats the prompt with an attempt marker and the
//! reason the previous output was rejected. Transport errors propagate on
//! the first occurrence.

use ideagate_provider::{structured_output, ResponseFormat};
use ideagate_schema::Validate;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ModelPolicy;
use crate::router::LlmRouter;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider call failed: {0:#}")]
    Transport(anyhow::Error),

    #[error("no valid output after {attempts} attempt(s): {reason}")]
    Invalid { attempts: u32, reason: String },
}

impl GenerationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// One structured request: which model role, what to say, which shape to get back.
pub struct StructuredCall<'a> {
    pub policy: &'a ModelPolicy,
    pub system: &'a str,
    pub prompt: String,
    pub format: ResponseFormat,
}

/// Run `call` until the output deserializes into `T`, passes `T::validate`
/// and `check`, or `max_attempts` is exhausted.
pub async fn generate_validated<T, F>(
    router: &LlmRouter,
    call: StructuredCall<'_>,
    max_attempts: u32,
    check: F,
) -> Result<T, GenerationError>
where
    T: DeserializeOwned + Validate,
    F: Fn(&T) -> Result<(), String>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=max_attempts {
        let prompt = if attempt == 1 {
            call.prompt.clone()
        } else {
            format!(
                "{}\n\n[attempt {attempt} of {max_attempts}] The previous response was rejected: \
                 {last_reason}. Return a corrected object that satisfies the schema exactly.",
                call.prompt
            )
        };

        let response = router
            .chat(call.policy, call.system, prompt, &call.format)
            .await
            .map_err(GenerationError::Transport)?;

        match parse_and_check::<T, F>(&response, &call.format, &check) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(schema = %call.format.name, attempt, "structured output accepted after retry");
                }
                return Ok(value);
            }
            Err(reason) => {
                tracing::warn!(
                    schema = %call.format.name,
                    attempt,
                    max_attempts,
                    "structured output rejected: {reason}"
                );
                last_reason = reason;
            }
        }
    }

    Err(GenerationError::Invalid {
        attempts: max_attempts,
        reason: last_reason,
    })
}

fn parse_and_check<T, F>(
    response: &ideagate_provider::LlmResponse,
    format: &ResponseFormat,
    check: &F,
) -> Result<T, String>
where
    T: DeserializeOwned + Validate,
    F: Fn(&T) -> Result<(), String>,
{
    let value = structured_output(response, format).map_err(|e| e.to_string())?;
    let parsed: T =
        serde_json::from_value(value).map_err(|e| format!("output does not match schema: {e}"))?;
    parsed.validate().map_err(|e| e.to_string())?;
    check(&parsed)?;
    Ok(parsed)
}

/// `check` that accepts everything.
pub fn no_check<T>(_: &T) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use ideagate_provider::{LlmProvider, LlmRequest, LlmResponse, ProviderRegistry};
    use ideagate_schema::SchemaError;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Summary {
        summary: String,
    }

    impl Validate for Summary {
        fn validate(&self) -> Result<(), SchemaError> {
            if self.summary.trim().is_empty() {
                return Err(SchemaError::missing("summary"));
            }
            Ok(())
        }
    }

    struct ScriptedProvider {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.prompts.lock().unwrap().push(request.messages[0].text());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")));
            reply.map(LlmResponse::from_text)
        }
    }

    fn router(provider: Arc<ScriptedProvider>) -> LlmRouter {
        let mut registry = ProviderRegistry::new();
        registry.register("test", provider);
        LlmRouter::new(registry, HashMap::new())
    }

    fn call(policy: &ModelPolicy) -> StructuredCall<'_> {
        StructuredCall {
            policy,
            system: "summarize",
            prompt: "Describe the change.".into(),
            format: ResponseFormat::new(
                "diff_summary",
                "short summary",
                serde_json::json!({"type": "object", "required": ["summary"]}),
            ),
        }
    }

    #[tokio::test]
    async fn retries_until_output_validates() {
        let provider = ScriptedProvider::new(vec![
            Ok("not json at all".into()),
            Ok("{\"summary\": \"  \"}".into()),
            Ok("{\"summary\": \"Score 60 → 70.\"}".into()),
        ]);
        let policy = ModelPolicy::new("test/model");
        let out: Summary = generate_validated(&router(provider.clone()), call(&policy), 3, no_check)
            .await
            .unwrap();
        assert_eq!(out.summary, "Score 60 → 70.");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0], "Describe the change.");
        assert!(prompts[1].contains("[attempt 2 of 3]"));
        assert!(prompts[2].contains("[attempt 3 of 3]"));
        assert!(prompts[2].contains("required field missing or empty: summary"));
    }

    #[tokio::test]
    async fn gives_up_with_last_reason() {
        let provider = ScriptedProvider::new(vec![Ok("{}".into()), Ok("[1, 2]".into())]);
        let policy = ModelPolicy::new("test/model");
        let err = generate_validated::<Summary, _>(&router(provider), call(&policy), 2, no_check)
            .await
            .unwrap_err();
        match err {
            GenerationError::Invalid { attempts, reason } => {
                assert_eq!(attempts, 2);
                assert_eq!(reason, "output is not a json object");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(anyhow::anyhow!("openai api error (500) [retryable]: boom")),
            Ok("{\"summary\": \"fine\"}".into()),
        ]);
        let policy = ModelPolicy::new("test/model");
        let err = generate_validated::<Summary, _>(&router(provider.clone()), call(&policy), 3, no_check)
            .await
            .unwrap_err();
        assert!(!err.is_validation());
        assert!(err.to_string().contains("boom"));
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn extra_check_rejections_are_retried() {
        let provider = ScriptedProvider::new(vec![
            Ok("{\"summary\": \"short\"}".into()),
            Ok("{\"summary\": \"long enough\"}".into()),
        ]);
        let policy = ModelPolicy::new("test/model");
        let out: Summary = generate_validated(&router(provider), call(&policy), 3, |s: &Summary| {
            if s.summary.len() < 6 {
                Err("summary too short".to_string())
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();
        assert_eq!(out.summary, "long enough");
    }
}
