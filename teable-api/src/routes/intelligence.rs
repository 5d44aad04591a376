//! Intelligence REST API Routes
//!
//! - `POST /generate-stream` and `POST /generate-stream/:base_id` stream a
//!   completion as server-sent events, one `data:` event per text delta.
//! - `POST /generate-batch` starts a backfill of one field in the
//!   background.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use teable_core::{BaseId, FieldId, IntelligenceOptions, TableId};
use teable_intelligence::{IntelligenceService, RunOutcome};
use teable_llm::TextStream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateStreamRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenerateBatchRequest {
    pub table_id: TableId,
    pub field_id: FieldId,
    pub options: IntelligenceOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateBatchResponse {
    pub message: String,
}

/// Interval of SSE comment frames keeping idle proxies from closing the
/// connection while the model thinks.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================================
// HANDLERS
// ============================================================================

/// Stream a completion for `prompt` with the coding model.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/intelligence/generate-stream",
    tag = "Intelligence",
    request_body = GenerateStreamRequest,
    responses(
        (status = 200, description = "Generated text deltas", content_type = "text/event-stream", body = String),
        (status = 400, description = "Empty prompt", body = ApiError),
        (status = 503, description = "No model configured", body = ApiError),
    ),
))]
pub async fn generate_stream(
    State(service): State<IntelligenceService>,
    Json(req): Json<GenerateStreamRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    start_stream(&service, None, &req.prompt).await
}

/// Stream a completion for `prompt` on behalf of a base.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/intelligence/generate-stream/{base_id}",
    tag = "Intelligence",
    params(("base_id" = String, Path, description = "Base requesting the generation")),
    request_body = GenerateStreamRequest,
    responses(
        (status = 200, description = "Generated text deltas", content_type = "text/event-stream", body = String),
        (status = 400, description = "Empty prompt", body = ApiError),
        (status = 503, description = "No model configured", body = ApiError),
    ),
))]
pub async fn generate_stream_for_base(
    State(service): State<IntelligenceService>,
    Path(base_id): Path<BaseId>,
    Json(req): Json<GenerateStreamRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    start_stream(&service, Some(&base_id), &req.prompt).await
}

/// Start a background backfill of one field.
///
/// Returns as soon as the run is spawned. A run already active for the
/// same field is cancelled by the new one.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/intelligence/generate-batch",
    tag = "Intelligence",
    request_body = GenerateBatchRequest,
    responses(
        (status = 200, description = "Backfill started", body = GenerateBatchResponse),
        (status = 400, description = "Invalid request body", body = ApiError),
    ),
))]
pub async fn generate_batch(
    State(service): State<IntelligenceService>,
    Json(req): Json<GenerateBatchRequest>,
) -> ApiResult<Json<GenerateBatchResponse>> {
    tracing::info!(
        table_id = %req.table_id,
        field_id = %req.field_id,
        "Batch generation requested"
    );

    tokio::spawn(async move {
        let GenerateBatchRequest {
            table_id,
            field_id,
            options,
        } = req;
        match service.trigger_create(&table_id, &field_id, &options).await {
            Ok(RunOutcome::Cancelled) => {
                tracing::info!(table_id = %table_id, field_id = %field_id, "Batch generation superseded");
            }
            Ok(outcome) => {
                tracing::debug!(table_id = %table_id, field_id = %field_id, outcome = ?outcome, "Batch generation finished");
            }
            Err(e) => {
                tracing::error!(table_id = %table_id, field_id = %field_id, error = %e, "Batch generation failed");
            }
        }
    });

    Ok(Json(GenerateBatchResponse {
        message: "Batch generation started".to_string(),
    }))
}

// ============================================================================
// STREAMING
// ============================================================================

async fn start_stream(
    service: &IntelligenceService,
    base_id: Option<&BaseId>,
    prompt: &str,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if prompt.trim().is_empty() {
        return Err(ApiError::missing_field("prompt"));
    }

    tracing::debug!(base_id = ?base_id.map(BaseId::as_str), "Starting generation stream");
    let deltas = service.generate_stream(prompt).await?;

    Ok(Sse::new(sse_events(deltas)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Map text deltas to SSE events.
///
/// A provider error mid-stream becomes one `error` event and ends the
/// stream; the status line has already been sent by then.
fn sse_events(mut deltas: TextStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) if text.is_empty() => {}
                Ok(text) => yield Ok(Event::default().data(text)),
                Err(e) => {
                    tracing::error!(error = %e, "Generation stream failed");
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            }
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/generate-stream", post(generate_stream))
        .route("/generate-stream/:base_id", post(generate_stream_for_base))
        .route("/generate-batch", post(generate_batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_request_uses_camel_case() {
        let req: GenerateBatchRequest = serde_json::from_value(json!({
            "tableId": "tblPeople",
            "fieldId": "fldBio",
            "options": {"enabled": true, "prompt": "Write a bio for {fldName}", "dynamicDepends": ["fldName"]}
        }))
        .unwrap();

        assert_eq!(req.table_id.as_str(), "tblPeople");
        assert_eq!(req.field_id.as_str(), "fldBio");
        assert!(req.options.is_valid_for_backfill());
    }

    #[tokio::test]
    async fn test_sse_events_stop_after_error() {
        let deltas: TextStream = Box::pin(futures_util::stream::iter(vec![
            Ok("Hel".to_string()),
            Ok(String::new()),
            Ok("lo".to_string()),
            Err(teable_core::LlmError::GenerationFailed {
                reason: "boom".to_string(),
            }
            .into()),
            Ok("never".to_string()),
        ]));

        let events: Vec<_> = sse_events(deltas).collect().await;
        assert_eq!(events.len(), 3);
    }
}
