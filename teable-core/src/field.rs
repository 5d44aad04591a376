//! Field and table metadata as seen by the intelligence pipeline.

use crate::{BaseId, FieldId, IntelligenceOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Primary key column of every user table.
pub const RECORD_ID_COLUMN: &str = "__id";

/// Auto-increment column used for stable paging.
pub const AUTO_NUMBER_COLUMN: &str = "__auto_number";

/// System columns present on every user table.
pub const SYSTEM_DB_FIELD_NAMES: &[&str] = &[
    RECORD_ID_COLUMN,
    "__version",
    AUTO_NUMBER_COLUMN,
    "__created_time",
    "__last_modified_time",
    "__created_by",
    "__last_modified_by",
];

/// Field options blob.
///
/// Only `intelligence` is interpreted here; every other option is carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<IntelligenceOptions>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    /// Display name, also the key used by the record update API.
    pub name: String,
    /// Physical column name.
    pub db_field_name: String,
    #[serde(default)]
    pub options: FieldOptions,
}

impl Field {
    pub fn new(id: impl Into<FieldId>, name: impl Into<String>, db_field_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            db_field_name: db_field_name.into(),
            options: FieldOptions::default(),
        }
    }

    pub fn with_intelligence(mut self, intelligence: IntelligenceOptions) -> Self {
        self.options.intelligence = Some(intelligence);
        self
    }

    pub fn intelligence(&self) -> Option<&IntelligenceOptions> {
        self.options.intelligence.as_ref()
    }

    /// True when the field has intelligence switched on.
    pub fn is_intelligence_enabled(&self) -> bool {
        self.intelligence().is_some_and(IntelligenceOptions::is_enabled)
    }
}

/// Physical location of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub base_id: BaseId,
    pub db_table_name: String,
}

/// Field id to physical column name.
pub type FieldMap = HashMap<FieldId, String>;

/// Build the field id → column lookup for a table's fields.
pub fn field_map(fields: &[Field]) -> FieldMap {
    fields
        .iter()
        .map(|field| (field.id.clone(), field.db_field_name.clone()))
        .collect()
}

/// Column names of the fields listed in `ids`, in table order.
///
/// Ids that do not name a field of the table are dropped.
pub fn db_field_names_for(fields: &[Field], ids: &[FieldId]) -> Vec<String> {
    fields
        .iter()
        .filter(|field| ids.contains(&field.id))
        .map(|field| field.db_field_name.clone())
        .collect()
}
