//! LLM provider implementations
//!
//! Concrete `TextGenerationProvider`s for OpenAI-compatible endpoints and
//! Anthropic, plus the error handling and throttling they share.

pub mod anthropic;
pub mod openai;
mod throttle;

pub use anthropic::{AnthropicClient, AnthropicTextGenerator};
pub use openai::{OpenAIClient, OpenAITextGenerator};

pub(crate) use throttle::RequestThrottle;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use teable_core::{LlmError, TeableError};

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> TeableError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> TeableError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> TeableError {
    LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
    .into()
}

pub(crate) fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

/// `{"error": {"message": ...}}`, the error body both vendors return.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body)
}

/// Map a non-2xx response onto an `LlmError`.
pub(crate) async fn error_from_response(provider: &str, response: Response) -> TeableError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);
        return rate_limited(provider, retry_after_ms);
    }

    let message = error_message(response.text().await.unwrap_or_default());
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!("Invalid API key: {}", message),
        _ => message,
    };
    request_failed(provider, i32::from(status.as_u16()), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_vendor_message() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(body.to_string()), "Overloaded");
        assert_eq!(error_message("bad gateway".to_string()), "bad gateway");
    }

    #[test]
    fn test_error_constructors() {
        let err = rate_limited("openai", 2000);
        assert!(matches!(
            err,
            TeableError::Llm(LlmError::RateLimited { retry_after_ms: 2000, .. })
        ));
        let err = request_failed("anthropic", 500, "boom");
        assert!(err.to_string().contains("500"));
        let err = invalid_response("openai", "empty");
        assert!(err.to_string().contains("empty"));
    }
}
