//! Anthropic text generation provider
//!
//! Streaming uses the trait default: the whole completion arrives as one
//! delta.

use super::client::AnthropicClient;
use super::types::{Message, MessageRequest, MessageResponse};
use crate::providers::invalid_response;
use crate::{TextGenerationProvider, UsageTracker};
use async_trait::async_trait;
use std::sync::Arc;
use teable_core::TeableResult;

const PROVIDER: &str = "anthropic";
const MAX_TOKENS: i32 = 4096;

pub struct AnthropicTextGenerator {
    client: Arc<AnthropicClient>,
    model: String,
    usage: Arc<UsageTracker>,
}

impl AnthropicTextGenerator {
    /// # Arguments
    /// * `client` - Shared, rate limited client
    /// * `model` - Model name (e.g., "claude-3-5-haiku-latest")
    /// * `usage` - Tracker that receives token counts
    pub fn new(
        client: Arc<AnthropicClient>,
        model: impl Into<String>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            usage,
        }
    }

    fn build_request(&self, prompt: &str) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_TOKENS,
            system: None,
            temperature: None,
        }
    }
}

#[async_trait]
impl TextGenerationProvider for AnthropicTextGenerator {
    async fn generate(&self, prompt: &str) -> TeableResult<String> {
        let request = self.build_request(prompt);
        let response: MessageResponse = self.client.request("messages", &request).await?;

        self.usage
            .record(response.usage.input_tokens, response.usage.output_tokens);

        let text = response.text();
        if response.content.is_empty() {
            return Err(invalid_response(PROVIDER, "No content in response"));
        }
        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for AnthropicTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicTextGenerator")
            .field("model", &self.model)
            .finish()
    }
}
