//! OpenAPI Specification for the Teable intelligence API
//!
//! Generated with utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{self, HealthResponse, HealthStatus};
use crate::routes::intelligence::{
    self, GenerateBatchRequest, GenerateBatchResponse, GenerateStreamRequest,
};
use crate::telemetry::metrics;
use teable_core::{FieldId, IntelligenceMethod, IntelligenceOptions, IntelligenceType, TableId};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Teable Intelligence API",
        description = "AI-generated table fields: streaming generation and field backfill",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Intelligence", description = "Text generation for AI fields"),
        (name = "Health", description = "Liveness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        intelligence::generate_stream,
        intelligence::generate_stream_for_base,
        intelligence::generate_batch,
        health::ping,
        health::liveness,
        metrics::metrics_handler,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        GenerateStreamRequest,
        GenerateBatchRequest,
        GenerateBatchResponse,
        HealthResponse,
        HealthStatus,
        IntelligenceOptions,
        IntelligenceType,
        IntelligenceMethod,
        TableId,
        FieldId,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Serialize the document as pretty JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.paths.paths.contains_key("/api/intelligence/generate-stream"));
        assert!(openapi
            .paths
            .paths
            .contains_key("/api/intelligence/generate-stream/{base_id}"));
        assert!(openapi.paths.paths.contains_key("/api/intelligence/generate-batch"));
        assert!(openapi.paths.paths.contains_key("/health/live"));
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("Teable Intelligence API"));
        assert!(json.contains("GenerateBatchRequest"));
        Ok(())
    }
}
