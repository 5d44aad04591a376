//! Teable Core - Intelligence Field Types
//!
//! Pure data structures shared by every crate of the workspace: entity
//! identifiers, field metadata, intelligence options, cell changes,
//! configuration and errors. No I/O lives here.

pub mod change;
pub mod config;
pub mod error;
pub mod field;
pub mod identity;
pub mod intelligence;

pub use change::{coerce_falsy, is_empty_value, CellChange, FieldChangeIndex, ValueChange};
pub use config::{
    IntelligenceConfig, ThresholdConfig, DEFAULT_FAILURE_MESSAGE, DEFAULT_THINKING_MESSAGE,
};
pub use error::{
    ConfigError, LlmError, StorageError, TeableError, TeableResult, ValidationError,
};
pub use field::{
    db_field_names_for, field_map, Field, FieldMap, FieldOptions, TableMeta, AUTO_NUMBER_COLUMN,
    RECORD_ID_COLUMN, SYSTEM_DB_FIELD_NAMES,
};
pub use identity::{BaseId, EntityIdType, FieldId, RecordId, TableId};
pub use intelligence::{
    IntelligenceMethod, IntelligenceMethodMeta, IntelligenceOptions, IntelligenceType,
    MethodReturnType,
};

/// A raw table row keyed by physical column name.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;
