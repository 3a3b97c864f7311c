//! Text generator implementations.
//!
//! [`create_generator`] builds the configured backend. Without an API key it
//! falls back to [`DisabledGenerator`], so flows without AI nodes still run.

pub mod gemini;

use std::time::Duration;

use flowrun_core::llm::box_generator::BoxTextGenerator;
use flowrun_core::llm::disabled::DisabledGenerator;
use flowrun_types::config::AiConfig;
use flowrun_types::error::GenerateError;
use secrecy::SecretString;

use self::gemini::GeminiGenerator;

/// Build a generator from `config` and an already resolved key.
///
/// A missing or blank key yields the disabled generator. An unknown provider
/// name is an error.
pub fn create_generator(
    config: &AiConfig,
    api_key: Option<&str>,
) -> Result<BoxTextGenerator, GenerateError> {
    let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
        tracing::info!(
            provider = %config.provider,
            env = %config.api_key_env,
            "no API key found, AI nodes are disabled"
        );
        return Ok(BoxTextGenerator::new(DisabledGenerator));
    };

    match config.provider.as_str() {
        "gemini" => {
            let generator = GeminiGenerator::new(
                SecretString::from(key.to_string()),
                config.model.clone(),
                Duration::from_secs(config.timeout_secs),
            )?
            .with_base_url(config.base_url.clone());
            tracing::info!(model = %config.model, "using gemini text generator");
            Ok(BoxTextGenerator::new(generator))
        }
        other => Err(GenerateError::Request(format!("unknown provider: {other}"))),
    }
}

/// Build a generator reading the key from `config.api_key_env`.
pub fn generator_from_env(config: &AiConfig) -> Result<BoxTextGenerator, GenerateError> {
    let key = std::env::var(&config.api_key_env).ok();
    create_generator(config, key.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_disables_generation() {
        let generator = create_generator(&AiConfig::default(), None).unwrap();
        assert_eq!(generator.name(), "disabled");

        let blank = create_generator(&AiConfig::default(), Some("  ")).unwrap();
        assert_eq!(blank.name(), "disabled");
    }

    #[test]
    fn test_key_selects_gemini() {
        let generator = create_generator(&AiConfig::default(), Some("k")).unwrap();
        assert_eq!(generator.name(), "gemini");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = AiConfig {
            provider: "palm".to_string(),
            ..AiConfig::default()
        };
        let err = create_generator(&config, Some("k")).unwrap_err();
        assert_eq!(err.to_string(), "request failed: unknown provider: palm");
    }

    #[test]
    fn test_env_lookup_uses_configured_variable() {
        let config = AiConfig {
            api_key_env: "FLOWRUN_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AiConfig::default()
        };
        assert_eq!(generator_from_env(&config).unwrap().name(), "disabled");
    }
}
