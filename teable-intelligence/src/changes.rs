//! Which intelligence fields a batch of cell changes affects.

use teable_core::{Field, FieldChangeIndex, FieldMap, RawRecord, RecordId};

/// Fields of a table with intelligence switched on, in table order.
pub fn intelligence_fields(fields: &[Field]) -> Vec<Field> {
    fields
        .iter()
        .filter(|field| field.is_intelligence_enabled())
        .cloned()
        .collect()
}

/// Intelligence fields with at least one dependency that received a
/// non-empty, changed value in this batch.
///
/// Fields without a dependency list are never affected.
pub fn affected_fields(intelligence_fields: &[Field], changes: &FieldChangeIndex) -> Vec<Field> {
    intelligence_fields
        .iter()
        .filter(|field| {
            field
                .intelligence()
                .and_then(|i| i.dynamic_depends.as_deref())
                .is_some_and(|depends| depends.iter().any(|d| changes.has_trigger_change(d)))
        })
        .cloned()
        .collect()
}

/// Known data of one record: the new values of its retained changes,
/// keyed by column name.
pub fn record_data_from_changes(
    record_id: &RecordId,
    field_map: &FieldMap,
    changes: &FieldChangeIndex,
) -> RawRecord {
    changes
        .iter()
        .filter(|(_, change_record, _)| *change_record == record_id)
        .filter_map(|(field_id, _, change)| {
            field_map
                .get(field_id)
                .map(|column| (column.clone(), change.new_value.clone()))
        })
        .collect()
}
