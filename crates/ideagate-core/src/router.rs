use std::collections::HashMap;

use anyhow::{anyhow, Result};
use ideagate_provider::{LlmRequest, LlmResponse, ProviderRegistry, ResponseFormat};

use crate::config::{parse_provider_model, ModelPolicy};

/// Resolves model aliases to registered providers and issues single calls.
///
/// Transport failures are returned as-is. The only retry policy in the
/// engine is the schema retry in [`crate::generation`].
#[derive(Clone)]
pub struct LlmRouter {
    registry: ProviderRegistry,
    aliases: HashMap<String, String>,
}

impl LlmRouter {
    pub fn new(registry: ProviderRegistry, aliases: HashMap<String, String>) -> Self {
        Self { registry, aliases }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Issue one structured request under `policy`.
    pub async fn chat(
        &self,
        policy: &ModelPolicy,
        system: &str,
        prompt: String,
        format: &ResponseFormat,
    ) -> Result<LlmResponse> {
        let resolved = self.resolve_model(&policy.primary)?;
        let (provider_id, model_id) = parse_provider_model(&resolved)?;
        let provider = self.registry.get(&provider_id)?;

        let mut request = LlmRequest::simple(model_id.clone(), Some(system.to_string()), prompt)
            .with_response_format(format.clone());
        request.max_tokens = policy.max_tokens;
        if let Some(temperature) = policy.temperature {
            request = request.with_temperature(temperature);
        }

        tracing::debug!(
            provider = %provider_id,
            model = %model_id,
            schema = %format.name,
            "dispatching structured request"
        );
        match provider.chat(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                let err_str = err.to_string();
                tracing::warn!(
                    provider = %provider_id,
                    retryable = err_str.contains("[retryable]"),
                    "provider call failed: {err_str}"
                );
                Err(err)
            }
        }
    }

    pub fn resolve_model(&self, raw: &str) -> Result<String> {
        if raw.contains('/') {
            return Ok(raw.to_string());
        }
        self.aliases
            .get(raw)
            .cloned()
            .ok_or_else(|| anyhow!("unknown model alias: {raw}"))
    }
}
