//! Provider construction by name.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provider::gemini::{GeminiOptions, GeminiProvider};
use crate::provider::{OpenAiProvider, Provider};

/// Names of the supported providers.
pub const PROVIDERS: &[&str] = &["gemini", "openai"];

/// Builds the provider named by `config.provider`.
///
/// A missing API key for the selected provider is an authentication error.
pub fn new_provider(config: &Config) -> Result<Box<dyn Provider>> {
    tracing::debug!(provider = %config.provider, model = %config.model, "constructing provider");
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            config.openai_api_key.clone().unwrap_or_default(),
            &config.openai_base_url,
            config.system_prompt(),
            config.timeout(),
        )?)),
        "gemini" => Ok(Box::new(GeminiProvider::new(GeminiOptions {
            api_key: config.gemini_api_key.clone().unwrap_or_default(),
            base_url: config.gemini_base_url.clone(),
            system_prompt: config.system_prompt(),
            timeout: config.timeout(),
            grounding: config.grounding,
            blocked_categories: config.blocked_categories.clone(),
        })?)),
        other => Err(Error::unknown_provider(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_openai() {
        let config = Config::new().with_openai_api_key("sk-test");
        let provider = new_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn builds_gemini() {
        let config = Config::new()
            .with_provider("gemini")
            .with_gemini_api_key("g-test");
        let provider = new_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn missing_key_is_authentication_error() {
        let err = new_provider(&Config::new().with_provider("gemini")).err().unwrap();
        assert!(err.is_authentication());
    }

    #[test]
    fn unknown_provider() {
        let err = new_provider(&Config::new().with_provider("llama"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownProvider { ref name } if name == "llama"));
    }

    #[test]
    fn every_listed_provider_is_constructible() {
        for name in PROVIDERS {
            let config = Config::new()
                .with_provider(*name)
                .with_openai_api_key("k")
                .with_gemini_api_key("k");
            assert_eq!(new_provider(&config).unwrap().name(), *name);
        }
    }
}
