//! GeminiGenerator: [`TextGenerator`] backed by the Gemini REST API.
//!
//! The API key is held as a [`SecretString`] and only exposed when the
//! request header is built.

use std::time::Duration;

use flowrun_core::llm::generator::TextGenerator;
use flowrun_types::error::GenerateError;
use secrecy::{ExposeSecret, SecretString};

use super::types::{ErrorResponse, GenerateContentRequest, GenerateContentResponse};

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    const API_KEY_HEADER: &'static str = "x-goog-api-key";

    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerateError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: model.into(),
        })
    }

    /// Override the base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

// No Debug derive: the struct holds the API key.

impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let response = self
            .client
            .post(self.url())
            .header(Self::API_KEY_HEADER, self.api_key.expose_secret())
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| GenerateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), model = %self.model, "gemini request rejected");
            return Err(GenerateError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Request(format!("failed to parse response: {e}")))?;

        body.text().ok_or(GenerateError::EmptyResponse)
    }
}
