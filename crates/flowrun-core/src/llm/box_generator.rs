//! BoxTextGenerator -- object-safe dynamic dispatch wrapper for TextGenerator.
//!
//! 1. `TextGeneratorDyn` is the object-safe twin with boxed futures
//! 2. Every `T: TextGenerator` gets it through a blanket impl
//! 3. `BoxTextGenerator` wraps `Box<dyn TextGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use flowrun_types::error::GenerateError;

use super::generator::TextGenerator;

/// Object-safe version of [`TextGenerator`] with boxed futures.
pub trait TextGeneratorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>>;
}

impl<T: TextGenerator> TextGeneratorDyn for T {
    fn name(&self) -> &str {
        TextGenerator::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>> {
        Box::pin(self.generate(prompt))
    }
}

/// Type-erased text generator, selected at runtime from configuration.
pub struct BoxTextGenerator {
    inner: Box<dyn TextGeneratorDyn + Send + Sync>,
}

impl BoxTextGenerator {
    pub fn new<T: TextGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.inner.generate_boxed(prompt).await
    }
}

impl std::fmt::Debug for BoxTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTextGenerator")
            .field("name", &self.name())
            .finish()
    }
}
