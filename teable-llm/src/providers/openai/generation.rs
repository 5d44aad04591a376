//! OpenAI text generation provider

use super::client::OpenAIClient;
use super::types::{CompletionChunk, CompletionRequest, CompletionResponse, Message, StreamOptions};
use crate::providers::{invalid_response, request_failed};
use crate::{TextGenerationProvider, TextStream, UsageTracker};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use teable_core::{TeableError, TeableResult};

const PROVIDER: &str = "openai";

/// Chat-completions backed text generator.
pub struct OpenAITextGenerator {
    client: Arc<OpenAIClient>,
    model: String,
    usage: Arc<UsageTracker>,
}

impl OpenAITextGenerator {
    /// # Arguments
    /// * `client` - Shared, rate limited client
    /// * `model` - Model name (e.g., "gpt-4o-mini", "gpt-4o")
    /// * `usage` - Tracker that receives token counts
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>, usage: Arc<UsageTracker>) -> Self {
        Self {
            client,
            model: model.into(),
            usage,
        }
    }

    fn build_request(&self, prompt: &str, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: None,
            temperature: None,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

#[async_trait]
impl TextGenerationProvider for OpenAITextGenerator {
    async fn generate(&self, prompt: &str) -> TeableResult<String> {
        let request = self.build_request(prompt, false);
        let response: CompletionResponse = self
            .client
            .request("chat/completions", &request)
            .await?;

        if let Some(usage) = &response.usage {
            self.usage
                .record(usage.prompt_tokens, usage.completion_tokens.unwrap_or(0));
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| invalid_response(PROVIDER, "No completion in response"))
    }

    async fn generate_stream(&self, prompt: &str) -> TeableResult<TextStream> {
        let request = self.build_request(prompt, true);
        let response = self
            .client
            .request_stream("chat/completions", &request)
            .await?;
        Ok(delta_stream(response.bytes_stream(), Arc::clone(&self.usage)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

/// Decode a chat-completions SSE body into text deltas.
///
/// Ends at `[DONE]`; a transport or decode error is yielded once and ends
/// the stream.
fn delta_stream<S, B, E>(body: S, usage: Arc<UsageTracker>) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut events = Box::pin(body.eventsource());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err::<String, TeableError>(request_failed(
                        PROVIDER,
                        0,
                        format!("Stream read failed: {}", e),
                    ));
                    break;
                }
            };
            if event.data == "[DONE]" {
                break;
            }

            let chunk: CompletionChunk = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(invalid_response(
                        PROVIDER,
                        format!("Failed to parse stream chunk: {}", e),
                    ));
                    break;
                }
            };
            if let Some(u) = &chunk.usage {
                usage.record(u.prompt_tokens, u.completion_tokens.unwrap_or(0));
            }
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    yield Ok(content);
                }
            }
        }
    };
    Box::pin(stream)
}

impl std::fmt::Debug for OpenAITextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAITextGenerator")
            .field("model", &self.model)
            .field("base_url", &self.client.base_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAITextGenerator {
        OpenAITextGenerator::new(
            Arc::new(OpenAIClient::new("sk", 60)),
            "gpt-4o-mini",
            Arc::new(UsageTracker::new()),
        )
    }

    #[test]
    fn test_stream_request_asks_for_usage() {
        let req = generator().build_request("Write a bio for Alice", true);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["messages"][0]["content"], "Write a bio for Alice");
    }

    fn sse_body(raw: &'static str) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
        // Split mid-line to exercise reassembly.
        let (head, tail) = raw.split_at(raw.len() / 2);
        futures_util::stream::iter(vec![Ok(head.as_bytes().to_vec()), Ok(tail.as_bytes().to_vec())])
    }

    async fn collect(stream: TextStream) -> Vec<TeableResult<String>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_delta_stream_yields_content_until_done() {
        let body = sse_body(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
             data: [DONE]\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        );

        let out: Vec<String> = collect(delta_stream(body, Arc::new(UsageTracker::new())))
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_delta_stream_joins_multiline_data() {
        let body = sse_body(
            "event: message\ndata: {\"choices\":\ndata: [{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n",
        );

        let out = collect(delta_stream(body, Arc::new(UsageTracker::new()))).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_deref().unwrap(), "Hi");
    }

    #[tokio::test]
    async fn test_delta_stream_stops_on_bad_chunk() {
        let body = sse_body("data: not json\n\ndata: [DONE]\n\n");

        let out = collect(delta_stream(body, Arc::new(UsageTracker::new()))).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_identity() {
        let g = generator();
        assert_eq!(g.model_id(), "gpt-4o-mini");
        assert_eq!(g.provider_name(), "openai");
    }
}
