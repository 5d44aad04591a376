//! Teable Intelligence API Server Entry Point
//!
//! Bootstraps configuration, wires the pipeline to Postgres and the
//! configured model providers, starts the trigger listener and serves the
//! Axum router.

use std::sync::Arc;

use teable_api::telemetry::{init_tracer, TelemetryConfig};
use teable_api::{
    create_api_router, resolve_bind_addr, ApiConfig, ApiError, ApiResult, AppState, DbConfig,
    PgTableStore,
};
use teable_core::{IntelligenceConfig, ThresholdConfig};
use teable_events::EventBus;
use teable_intelligence::{IntelligenceService, IntelligenceTriggerListener, RunRegistry};
use teable_llm::{AiConfig, AiTask, ModelRegistry};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();
    let store = Arc::new(PgTableStore::from_config(&DbConfig::from_env())?);

    let ai_config = AiConfig::from_env()?;
    let models = Arc::new(ModelRegistry::new(ai_config));
    if !models.has_model(AiTask::Coding) {
        tracing::warn!("No coding model configured; generation requests will fail");
    }

    let service = IntelligenceService::new(
        store,
        models,
        Arc::new(RunRegistry::new()),
        IntelligenceConfig::from_env(),
        ThresholdConfig::from_env(),
    );

    let bus = Arc::new(EventBus::new(api_config.event_capacity));
    let listener_handle = IntelligenceTriggerListener::new(service.clone()).spawn(&bus);

    let app = create_api_router(AppState::new(service, bus), &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Teable intelligence API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    // The router owned the last bus handle; the listener drains and exits.
    if let Err(e) = listener_handle.await {
        tracing::warn!(error = %e, "Trigger listener ended abnormally");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
