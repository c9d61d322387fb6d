//! Language-model provider implementations for Repobot.
//!
//! All providers implement the `repobot_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use repobot_core::error::ProviderError;
use std::sync::Arc;

/// Build the provider named by `[model] provider`.
pub fn from_config(
    config: &repobot_config::ModelConfig,
) -> Result<Arc<dyn repobot_core::Provider>, ProviderError> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Ok(Arc::new(AnthropicProvider::from_config(config)?)),
        other => Err(ProviderError::NotConfigured(format!(
            "unknown provider '{other}' (supported: anthropic)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = repobot_config::ModelConfig {
            provider: "openrouter".into(),
            api_key: Some("k".into()),
            ..Default::default()
        };
        let err = from_config(&config).err().unwrap();
        assert!(err.to_string().contains("openrouter"));
    }

    #[test]
    fn anthropic_provider_is_built() {
        let config = repobot_config::ModelConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }
}
