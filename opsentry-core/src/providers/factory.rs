//! Provider factory for creating LLM provider instances

use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderName};
use crate::session::MetricsTracker;
use crate::{Error, Result};

use super::{AnthropicProvider, LlmProvider, OpenAiProvider};

/// Create a provider for the given model from configuration.
///
/// The model argument overrides the model in the config; the session
/// orchestrator re-invokes the factory whenever the active model changes.
pub fn create_provider(
    config: &ProviderConfig,
    model: &str,
    metrics: MetricsTracker,
) -> Result<Arc<dyn LlmProvider>> {
    match config.name {
        ProviderName::Anthropic => {
            let provider = if let Some(ref api_key) = config.api_key {
                AnthropicProvider::with_api_key(api_key, model, metrics)?
            } else {
                AnthropicProvider::new(model, metrics)?
            };
            Ok(Arc::new(provider))
        }
        ProviderName::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| Error::Provider("OPENAI_API_KEY not set".to_string()))?;

            let provider = if let Some(ref base_url) = config.base_url {
                OpenAiProvider::with_base_url(api_key, base_url, model, metrics)?
            } else {
                OpenAiProvider::with_api_key(api_key, model, metrics)?
            };
            Ok(Arc::new(provider))
        }
        ProviderName::LiteLlm => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:4000".to_string());
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("LITELLM_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    Error::Provider("LITELLM_API_KEY or OPENAI_API_KEY not set".to_string())
                })?;
            let provider = OpenAiProvider::with_base_url(api_key, base_url, model, metrics)?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_anthropic_uses_config_api_key() {
        let config = ProviderConfig {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: Some("test-key-from-config".to_string()),
            base_url: None,
        };
        let result = create_provider(&config, &config.model, MetricsTracker::new());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().name(), "anthropic");
    }

    #[test]
    fn test_create_provider_model_overrides_config() {
        let config = ProviderConfig {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: None,
        };
        let provider = create_provider(&config, "claude-haiku-3-5", MetricsTracker::new()).unwrap();
        assert_eq!(provider.model(), "claude-haiku-3-5");
    }

    #[test]
    fn test_create_openai_requires_api_key() {
        let original = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let config = ProviderConfig {
            name: ProviderName::OpenAi,
            model: "gpt-4o".to_string(),
            api_key: None,
            base_url: None,
        };
        let result = create_provider(&config, "gpt-4o", MetricsTracker::new());
        assert!(result.is_err());

        if let Some(key) = original {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }

    #[test]
    fn test_litellm_uses_config_api_key() {
        let config = ProviderConfig {
            name: ProviderName::LiteLlm,
            model: "gpt-4o".to_string(),
            api_key: Some("test-key-from-config".to_string()),
            base_url: Some("http://localhost:4000".to_string()),
        };
        let result = create_provider(&config, "gpt-4o", MetricsTracker::new());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().name(), "openai");
    }
}
