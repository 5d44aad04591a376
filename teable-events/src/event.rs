//! Event payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use teable_core::{coerce_falsy, CellChange, Field, FieldId, RecordId, TableId};

/// A single item or a list of items.
///
/// Event producers send either shape for the same event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    /// Borrow as a slice regardless of shape.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }
}

/// A record as it was created, cell values keyed by field id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecord {
    pub id: RecordId,
    #[serde(default)]
    pub fields: BTreeMap<FieldId, Value>,
}

/// Old and new value of one updated cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedCell {
    #[serde(default)]
    pub old_value: Value,
    #[serde(default)]
    pub new_value: Value,
}

/// Updated cells of one record, keyed by field id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRecord {
    pub id: RecordId,
    #[serde(default)]
    pub fields: BTreeMap<FieldId, UpdatedCell>,
}

/// Change events emitted by the table services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TableEvent {
    /// One or more fields were added to a table.
    #[serde(rename_all = "camelCase")]
    FieldCreated {
        table_id: TableId,
        field: OneOrMany<Field>,
    },

    /// Records were inserted.
    #[serde(rename_all = "camelCase")]
    RecordsCreated {
        table_id: TableId,
        records: Vec<CreatedRecord>,
    },

    /// Cells of existing records changed.
    #[serde(rename_all = "camelCase")]
    RecordsUpdated {
        table_id: TableId,
        record: OneOrMany<UpdatedRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl TableEvent {
    /// Get the event type as a string for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FieldCreated { .. } => "field_created",
            Self::RecordsCreated { .. } => "records_created",
            Self::RecordsUpdated { .. } => "records_updated",
        }
    }

    pub fn table_id(&self) -> &TableId {
        match self {
            Self::FieldCreated { table_id, .. }
            | Self::RecordsCreated { table_id, .. }
            | Self::RecordsUpdated { table_id, .. } => table_id,
        }
    }

    /// Cell changes carried by a `RecordsUpdated` event.
    ///
    /// Falsy old and new values are coerced to null. Other events carry no
    /// cell changes.
    pub fn cell_changes(&self) -> Vec<CellChange> {
        let Self::RecordsUpdated { record, .. } = self else {
            return Vec::new();
        };
        record
            .as_slice()
            .iter()
            .flat_map(|rec| {
                rec.fields.iter().map(move |(field_id, cell)| CellChange {
                    field_id: field_id.clone(),
                    record_id: rec.id.clone(),
                    old_value: coerce_falsy(cell.old_value.clone()),
                    new_value: coerce_falsy(cell.new_value.clone()),
                })
            })
            .collect()
    }
}
