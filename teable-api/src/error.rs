//! HTTP error responses.
//!
//! Every failure leaving a handler becomes an [`ApiError`] serialized as
//! `{code, message, details?}`; the [`ErrorCode`] decides the status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use teable_core::{LlmError, StorageError, TeableError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Machine-readable error category, serialized in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400
    ValidationFailed,
    InvalidInput,
    MissingField,

    // 404
    TableNotFound,
    FieldNotFound,
    RecordNotFound,

    /// No model key is mapped to the task (503).
    ModelNotConfigured,
    /// The upstream model API failed (502).
    ProviderError,
    /// The upstream model API is throttling us (429).
    TooManyRequests,

    // 5xx
    InternalError,
    DatabaseError,
    ServiceUnavailable,
    ConnectionPoolExhausted,
}

impl ErrorCode {
    fn describe(self) -> (StatusCode, &'static str) {
        use ErrorCode::*;
        match self {
            ValidationFailed => (StatusCode::BAD_REQUEST, "Request validation failed"),
            InvalidInput => (StatusCode::BAD_REQUEST, "Invalid input data"),
            MissingField => (StatusCode::BAD_REQUEST, "Required field is missing"),
            TableNotFound => (StatusCode::NOT_FOUND, "Table not found"),
            FieldNotFound => (StatusCode::NOT_FOUND, "Field not found"),
            RecordNotFound => (StatusCode::NOT_FOUND, "Record not found"),
            ModelNotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "No AI model configured"),
            ProviderError => (StatusCode::BAD_GATEWAY, "AI provider request failed"),
            TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
            InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            DatabaseError => (StatusCode::INTERNAL_SERVER_ERROR, "Database operation failed"),
            ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            ),
            ConnectionPoolExhausted => {
                (StatusCode::SERVICE_UNAVAILABLE, "Connection pool exhausted")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.describe().0
    }

    pub fn default_message(&self) -> &'static str {
        self.describe().1
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// JSON error body returned by every route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Lets handlers return `ApiResult<T>` directly.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<TeableError> for ApiError {
    fn from(err: TeableError) -> Self {
        match &err {
            TeableError::Storage(StorageError::TableNotFound { .. }) => {
                ApiError::new(ErrorCode::TableNotFound, err.to_string())
            }
            TeableError::Storage(StorageError::FieldNotFound { .. }) => {
                ApiError::new(ErrorCode::FieldNotFound, err.to_string())
            }
            TeableError::Storage(StorageError::RecordNotFound { .. }) => {
                ApiError::new(ErrorCode::RecordNotFound, err.to_string())
            }
            TeableError::Storage(_) => {
                tracing::error!(error = %err, "Storage error");
                ApiError::database_error("Database operation failed")
            }
            TeableError::Llm(LlmError::ProviderNotConfigured | LlmError::ModelNotConfigured { .. }) => {
                ApiError::new(ErrorCode::ModelNotConfigured, err.to_string())
            }
            TeableError::Llm(LlmError::RateLimited { .. }) => {
                ApiError::new(ErrorCode::TooManyRequests, err.to_string())
            }
            TeableError::Llm(_) => {
                tracing::warn!(error = %err, "AI provider error");
                ApiError::new(ErrorCode::ProviderError, err.to_string())
            }
            TeableError::Validation(_) => ApiError::validation_failed(err.to_string()),
            TeableError::Config(_) => {
                tracing::error!(error = %err, "Configuration error");
                ApiError::internal_error(err.to_string())
            }
            TeableError::Cancelled => ApiError::service_unavailable("Task cancelled"),
        }
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!(error = %err, "Postgres query failed");
        ApiError::from_code(ErrorCode::DatabaseError)
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!(error = %err, "Postgres pool checkout failed");

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
