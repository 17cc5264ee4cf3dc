//! OpenAI provider implementation using rig-core

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::pricing::PricingConfig;
use crate::session::MetricsTracker;
use crate::{Error, Result};

use super::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};

/// OpenAI provider using rig-core
pub struct OpenAiProvider {
    client: openai::Client,
    model: String,
    metrics: MetricsTracker,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from OPENAI_API_KEY env var
    pub fn new(model: impl Into<String>, metrics: MetricsTracker) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Provider("OPENAI_API_KEY not set".to_string()))?;
        Self::with_api_key(api_key, model, metrics)
    }

    /// Create with custom API key
    pub fn with_api_key(
        api_key: impl Into<String>,
        model: impl Into<String>,
        metrics: MetricsTracker,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let client = openai::Client::builder(&api_key)
            .build()
            .map_err(|e| Error::Provider(format!("Failed to build OpenAI client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            metrics,
        })
    }

    /// Create with custom base URL (for LiteLLM proxy or compatible APIs)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        metrics: MetricsTracker,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let base_url = base_url.into();
        let client = openai::Client::builder(&api_key)
            .base_url(&base_url)
            .build()
            .map_err(|e| Error::Provider(format!("Failed to build OpenAI client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            metrics,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let prompt = request
            .messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let agent = self
            .client
            .agent(&self.model)
            .preamble(
                request
                    .system
                    .as_deref()
                    .unwrap_or("You are a helpful assistant."),
            )
            .max_tokens(request.max_tokens.unwrap_or(4096) as u64)
            .build();

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| Error::Provider(format!("OpenAI completion failed: {}", e)))?;

        let estimated_input = prompt.len() as u64 / 4;
        let estimated_output = response.len() as u64 / 4;
        let pricing = PricingConfig::load();
        let cost = pricing.calculate_cost("openai", &self.model, estimated_input, estimated_output);
        self.metrics
            .record_tokens(estimated_input, 0, estimated_output, cost);

        Ok(CompletionResponse {
            content: Some(response),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: estimated_input,
                output_tokens: estimated_output,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
            },
        })
    }

    fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_requires_api_key() {
        let original = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let result = OpenAiProvider::new("gpt-4o", MetricsTracker::new());
        assert!(result.is_err());

        if let Some(key) = original {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }

    #[test]
    fn test_provider_with_api_key() {
        let provider = OpenAiProvider::with_api_key("test-key", "gpt-4o", MetricsTracker::new())
            .expect("client should build");
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_tools());
    }

    #[test]
    fn test_provider_with_base_url() {
        let result = OpenAiProvider::with_base_url(
            "test-key",
            "http://localhost:4000",
            "gpt-4o",
            MetricsTracker::new(),
        );
        assert!(result.is_ok());
    }
}
