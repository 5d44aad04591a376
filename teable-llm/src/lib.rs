//! Teable LLM - Text Generation Layer
//!
//! Provider-agnostic traits for text generation, the registry that maps an
//! AI task to a configured model, and the concrete HTTP providers.

pub mod config;
pub mod mock;
pub mod providers;
pub mod registry;
pub mod usage;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use teable_core::TeableResult;

pub use config::{AiConfig, AiTask, LlmProviderConfig, ModelKey, ProviderKind};
pub use mock::MockTextGenerator;
pub use registry::ModelRegistry;
pub use usage::UsageTracker;

/// Stream of generated text deltas.
pub type TextStream = BoxStream<'static, TeableResult<String>>;

// ============================================================================
// TEXT GENERATION PROVIDER TRAIT
// ============================================================================

/// Trait for text generation providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// let provider = registry.resolve(AiTask::Coding)?;
/// let text = provider.generate("Write a bio for Alice").await?;
/// ```
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Generate the full completion for a prompt.
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(TeableError::Llm)` - If the provider call fails
    async fn generate(&self, prompt: &str) -> TeableResult<String>;

    /// Generate a completion as a stream of text deltas.
    ///
    /// Providers without native streaming yield the whole completion as a
    /// single delta.
    async fn generate_stream(&self, prompt: &str) -> TeableResult<TextStream> {
        let text = self.generate(prompt).await?;
        Ok(Box::pin(futures_util::stream::once(async move { Ok(text) })))
    }

    /// Model identifier used for requests (e.g. "gpt-4o-mini").
    fn model_id(&self) -> &str;

    /// Provider name used in logs and errors (e.g. "openai").
    fn provider_name(&self) -> &str;
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_default_stream_yields_single_delta() {
        let provider = MockTextGenerator::new("mock-model");
        let mut stream = provider.generate_stream("hello").await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "generated: hello");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let provider: std::sync::Arc<dyn TextGenerationProvider> =
            std::sync::Arc::new(MockTextGenerator::new("mock-model"));
        assert_eq!(provider.model_id(), "mock-model");
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.generate("x").await.unwrap(), "generated: x");
    }
}
