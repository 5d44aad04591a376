//! Error types for Teable intelligence operations

use crate::{FieldId, RecordId, TableId};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Table not found: {table_id}")]
    TableNotFound { table_id: TableId },

    #[error("Record not found: {record_id} in table {table_id}")]
    RecordNotFound { table_id: TableId, record_id: RecordId },

    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Update failed for record {record_id}: {reason}")]
    UpdateFailed { record_id: RecordId, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// LLM provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("No model configured for task {task}")]
    ModelNotConfigured { task: String },

    #[error("Unknown model key: {key}")]
    UnknownModel { key: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Generation failed: {reason}")]
    GenerationFailed { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Dependency cycle between intelligence fields: {field_ids:?}")]
    DependencyCycle { field_ids: Vec<FieldId> },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

/// Master error type for all Teable intelligence errors.
#[derive(Debug, Clone, Error)]
pub enum TeableError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A run was superseded or stopped; not a failure.
    #[error("Task cancelled")]
    Cancelled,
}

impl TeableError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for Teable intelligence operations.
pub type TeableResult<T> = Result<T, TeableError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_update_failed() {
        let err = StorageError::UpdateFailed {
            record_id: "recA".into(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("recA"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_llm_error_display_rate_limited() {
        let err = LlmError::RateLimited {
            provider: "openai".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("openai"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_dependency_cycle_names_fields() {
        let err = ValidationError::DependencyCycle {
            field_ids: vec!["fldA".into(), "fldB".into()],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("fldA"));
        assert!(msg.contains("fldB"));
    }

    #[test]
    fn test_cancelled_message_and_predicate() {
        let err = TeableError::Cancelled;
        assert_eq!(err.to_string(), "Task cancelled");
        assert!(err.is_cancelled());

        let err: TeableError = LlmError::ProviderNotConfigured.into();
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_from_conversions() {
        let err: TeableError = StorageError::LockPoisoned.into();
        assert!(matches!(err, TeableError::Storage(StorageError::LockPoisoned)));

        let err: TeableError = ConfigError::MissingRequired {
            field: "coding_model".to_string(),
        }
        .into();
        assert!(err.to_string().contains("coding_model"));
    }
}
