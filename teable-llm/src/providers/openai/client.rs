//! Chat-completions HTTP client

use crate::providers::{error_from_response, invalid_response, request_failed, RequestThrottle};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use teable_core::TeableResult;

const PROVIDER: &str = "openai";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for api.openai.com or any endpoint speaking the same protocol.
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
    throttle: RequestThrottle,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle: RequestThrottle::per_minute(PROVIDER, requests_per_minute),
        }
    }

    /// Point the client at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` and decode the JSON reply.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> TeableResult<Res> {
        self.post(endpoint, body)
            .await?
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))
    }

    /// POST `body` and hand back the raw response for SSE consumption.
    pub async fn request_stream<Req: Serialize>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> TeableResult<Response> {
        self.post(endpoint, body).await
    }

    async fn post<Req: Serialize>(&self, endpoint: &str, body: &Req) -> TeableResult<Response> {
        let _permit = self.throttle.acquire().await?;

        let response = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(PROVIDER, response).await)
        }
    }
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
