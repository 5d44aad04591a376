//! Mock provider for tests and local development.

use crate::TextGenerationProvider;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teable_core::{LlmError, TeableResult};

type Responder = dyn Fn(&str) -> TeableResult<String> + Send + Sync;

/// Deterministic text generator that records every prompt it receives.
///
/// By default it answers `"generated: {prompt}"`. Prompts containing a
/// configured failure marker return an error instead.
#[derive(Clone)]
pub struct MockTextGenerator {
    model_id: String,
    prompts: Arc<Mutex<Vec<String>>>,
    responder: Option<Arc<Responder>>,
    fail_marker: Option<String>,
    latency: Duration,
}

impl MockTextGenerator {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            responder: None,
            fail_marker: None,
            latency: Duration::ZERO,
        }
    }

    /// Answer with a custom function of the prompt.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> TeableResult<String> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Fail every prompt that contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Sleep before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for MockTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTextGenerator")
            .field("model_id", &self.model_id)
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl TextGenerationProvider for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> TeableResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(LlmError::GenerationFailed {
                    reason: format!("mock failure for prompt containing {marker}"),
                }
                .into());
            }
        }
        match &self.responder {
            Some(responder) => responder(prompt),
            None => Ok(format!("generated: {prompt}")),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_prompts_in_order() {
        let mock = MockTextGenerator::new("m");
        mock.generate("a").await.unwrap();
        mock.generate("b").await.unwrap();
        assert_eq!(mock.prompts(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_marker() {
        let mock = MockTextGenerator::new("m").failing_on("BOOM");
        assert!(mock.generate("ok").await.is_ok());
        assert!(mock.generate("BOOM here").await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_custom_responder() {
        let mock = MockTextGenerator::new("m").with_responder(|p| Ok(p.to_uppercase()));
        assert_eq!(mock.generate("abc").await.unwrap(), "ABC");
    }
}
