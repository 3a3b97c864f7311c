use flowrun_types::error::GenerateError;

use super::generator::TextGenerator;

/// Generator used when no backend is configured.
///
/// Flows without AI nodes run normally; an AI node fails with
/// `[AIBridgeError] no text generator configured`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_fails() {
        let err = DisabledGenerator.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerateError::NotConfigured));
    }
}
