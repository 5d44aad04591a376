//! Internal event ingestion.
//!
//! The record service posts table change events here; they are published
//! on the in-process bus consumed by the intelligence trigger listener.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use teable_events::{EventBus, TableEvent};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::telemetry::with_metrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishEventResponse {
    /// Subscribers that received the event.
    pub receivers: usize,
}

/// POST /api/internal/events - publish one table event.
pub async fn publish_event(
    State(bus): State<Arc<EventBus>>,
    Json(event): Json<TableEvent>,
) -> ApiResult<(StatusCode, Json<PublishEventResponse>)> {
    let event_type = event.event_type();
    tracing::debug!(
        event_type,
        table_id = %event.table_id(),
        "Table event received"
    );

    let receivers = bus.publish(event);
    with_metrics(|m| m.record_event_ingested(event_type));

    Ok((StatusCode::ACCEPTED, Json(PublishEventResponse { receivers })))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
