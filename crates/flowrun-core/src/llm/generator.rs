//! TextGenerator trait definition.

use flowrun_types::error::GenerateError;

/// A prompt-in, text-out backend used by AI nodes.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Network
/// implementations live in flowrun-infra (e.g., `GeminiGenerator`).
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Generate text for a fully expanded prompt.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerateError>> + Send;
}
