//! Cell change records and the per-batch change index.

use crate::{FieldId, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// An observed mutation of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChange {
    pub field_id: FieldId,
    pub record_id: RecordId,
    #[serde(default)]
    pub old_value: Value,
    #[serde(default)]
    pub new_value: Value,
}

impl CellChange {
    pub fn new(
        field_id: impl Into<FieldId>,
        record_id: impl Into<RecordId>,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            record_id: record_id.into(),
            old_value,
            new_value,
        }
    }
}

/// Old and new value of a retained change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub old_value: Value,
    pub new_value: Value,
}

impl ValueChange {
    /// A change that can trigger regeneration of dependents: the new value
    /// is non-empty and differs from the old one.
    pub fn is_trigger(&self) -> bool {
        !is_empty_value(&self.new_value) && self.new_value != self.old_value
    }
}

/// Null or the empty string.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Map falsy JSON values (`null`, `false`, `0`, `""`) to `null`.
///
/// Record update events carry values through this coercion before they are
/// turned into cell changes.
pub fn coerce_falsy(value: Value) -> Value {
    let falsy = match &value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    };
    if falsy {
        Value::Null
    } else {
        value
    }
}

/// Changes of one batch grouped by field, then by record.
///
/// Every field seen in the batch has an entry, even if none of its changes
/// were retained. Records are remembered in first-seen order so callers
/// can process them deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChangeIndex {
    fields: HashMap<FieldId, HashMap<RecordId, ValueChange>>,
    record_order: Vec<RecordId>,
    seen_records: HashSet<RecordId>,
}

impl FieldChangeIndex {
    /// Group a batch of changes.
    ///
    /// A change is retained when its old value is null or when the value
    /// actually changed; unchanged non-null cells are dropped.
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = &'a CellChange>) -> Self {
        let mut index = Self::default();
        for change in changes {
            let records = index.fields.entry(change.field_id.clone()).or_default();
            if change.old_value.is_null() || change.new_value != change.old_value {
                if index.seen_records.insert(change.record_id.clone()) {
                    index.record_order.push(change.record_id.clone());
                }
                records.insert(
                    change.record_id.clone(),
                    ValueChange {
                        old_value: change.old_value.clone(),
                        new_value: change.new_value.clone(),
                    },
                );
            }
        }
        index
    }

    /// True when the batch touched no field at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Retained changes of one field.
    pub fn changes_for(&self, field_id: &FieldId) -> Option<&HashMap<RecordId, ValueChange>> {
        self.fields.get(field_id)
    }

    /// Retained change of one cell.
    pub fn change(&self, field_id: &FieldId, record_id: &RecordId) -> Option<&ValueChange> {
        self.fields.get(field_id)?.get(record_id)
    }

    /// True if any retained change of `field_id` can trigger dependents.
    pub fn has_trigger_change(&self, field_id: &FieldId) -> bool {
        self.fields
            .get(field_id)
            .is_some_and(|records| records.values().any(ValueChange::is_trigger))
    }

    /// Records with at least one retained change, in first-seen order.
    pub fn record_ids(&self) -> &[RecordId] {
        &self.record_order
    }

    /// Iterate `(field, record, change)` over all retained changes.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &RecordId, &ValueChange)> {
        self.fields.iter().flat_map(|(field_id, records)| {
            records
                .iter()
                .map(move |(record_id, change)| (field_id, record_id, change))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unchanged_non_null_is_dropped_but_field_listed() {
        let changes = vec![CellChange::new("fld1", "rec1", json!("a"), json!("a"))];
        let index = FieldChangeIndex::from_changes(&changes);
        assert!(!index.is_empty());
        assert!(index.changes_for(&"fld1".into()).unwrap().is_empty());
        assert!(index.record_ids().is_empty());
    }

    #[test]
    fn test_null_old_value_is_always_retained() {
        let changes = vec![CellChange::new("fld1", "rec1", Value::Null, Value::Null)];
        let index = FieldChangeIndex::from_changes(&changes);
        assert!(index.change(&"fld1".into(), &"rec1".into()).is_some());
        // Retained, but a null new value never triggers dependents.
        assert!(!index.has_trigger_change(&"fld1".into()));
    }

    #[test]
    fn test_trigger_requires_non_empty_new_value() {
        let set = vec![CellChange::new("fld1", "rec1", Value::Null, json!("x"))];
        assert!(FieldChangeIndex::from_changes(&set).has_trigger_change(&"fld1".into()));

        let cleared = vec![CellChange::new("fld1", "rec1", Value::Null, json!(""))];
        assert!(!FieldChangeIndex::from_changes(&cleared).has_trigger_change(&"fld1".into()));

        let deleted = vec![CellChange::new("fld1", "rec1", json!("x"), Value::Null)];
        assert!(!FieldChangeIndex::from_changes(&deleted).has_trigger_change(&"fld1".into()));
    }

    #[test]
    fn test_record_order_is_first_seen() {
        let changes = vec![
            CellChange::new("fld1", "rec2", Value::Null, json!(1)),
            CellChange::new("fld2", "rec1", Value::Null, json!(2)),
            CellChange::new("fld2", "rec2", Value::Null, json!(3)),
        ];
        let index = FieldChangeIndex::from_changes(&changes);
        assert_eq!(index.record_ids(), &[RecordId::from("rec2"), RecordId::from("rec1")]);
        assert_eq!(index.iter().count(), 3);
    }

    #[test]
    fn test_large_batch_indexes_in_linear_time() {
        let records = 40_000;
        let changes: Vec<CellChange> = (0..3)
            .flat_map(|f| {
                (0..records).map(move |r| {
                    CellChange::new(format!("fld{}", f), format!("rec{}", r), Value::Null, json!(r))
                })
            })
            .collect();

        let started = std::time::Instant::now();
        let index = FieldChangeIndex::from_changes(&changes);
        let elapsed = started.elapsed();

        assert_eq!(index.record_ids().len(), records);
        assert_eq!(index.record_ids()[0], RecordId::from("rec0"));
        assert_eq!(index.record_ids()[records - 1], RecordId::from(format!("rec{}", records - 1)));
        assert!(elapsed < std::time::Duration::from_secs(5), "indexing took {:?}", elapsed);
    }

    #[test]
    fn test_coerce_falsy() {
        assert_eq!(coerce_falsy(json!("")), Value::Null);
        assert_eq!(coerce_falsy(json!(0)), Value::Null);
        assert_eq!(coerce_falsy(json!(false)), Value::Null);
        assert_eq!(coerce_falsy(json!("a")), json!("a"));
        assert_eq!(coerce_falsy(json!([])), json!([]));
    }
}
