//! Health endpoints: `/health/ping` and `/health/live`.
//!
//! Liveness also reports whether a cell generation model is wired and how
//! many backfill runs are in flight, so an operator can tell a healthy but
//! unconfigured deployment from a working one.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use teable_llm::AiTask;

use crate::state::AppState;

/// Liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    /// `provider@model` key serving cell generation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding_model: Option<String>,
    pub active_runs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving, with a generation model configured.
    Healthy,
    /// Serving, but every generation request will fail.
    Degraded,
}

impl HealthResponse {
    fn from_state(state: &AppState) -> Self {
        let coding_model = state.service.models().model_key(AiTask::Coding);
        Self {
            status: if coding_model.is_some() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            coding_model,
            active_runs: state.service.runs().active_count(),
        }
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses((status = 200, description = "Server is responding", body = String)),
))]
pub async fn ping() -> &'static str {
    "pong"
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is alive", body = HealthResponse)),
))]
pub async fn liveness(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_state(&state))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_report_omits_model() {
        let response = HealthResponse {
            status: HealthStatus::Degraded,
            version: "0.4.0".to_string(),
            uptime_seconds: 12,
            coding_model: None,
            active_runs: 0,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["active_runs"], 0);
        assert!(json.get("coding_model").is_none());
    }
}
