//! Prompt templating.
//!
//! Templates reference other fields of the same record as `{fieldId}`.

use serde_json::Value;
use teable_core::{FieldId, FieldMap, RawRecord};

/// Text form of a cell value inside a prompt.
///
/// Null renders empty, strings render raw, arrays render their elements
/// joined by commas and objects render as JSON.
pub fn value_to_prompt_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_prompt_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn placeholder(field_id: &FieldId) -> String {
    format!("{{{}}}", field_id)
}

/// Fill a template from a raw row for a whole-table backfill.
///
/// Placeholders of fields the table knows are replaced by the row's value,
/// or by the empty string when the column is missing or null. Placeholders
/// of unknown fields stay as literal text.
pub fn render_backfill_prompt(
    template: &str,
    depends: &[FieldId],
    field_map: &FieldMap,
    record: &RawRecord,
) -> String {
    depends.iter().fold(template.to_string(), |prompt, field_id| {
        match field_map.get(field_id) {
            Some(column) => {
                let text = record.get(column).map(value_to_prompt_text).unwrap_or_default();
                prompt.replace(&placeholder(field_id), &text)
            }
            None => prompt,
        }
    })
}

/// Column names of dependencies absent from a record's known data.
///
/// A dependency the table does not know at all counts as missing.
pub fn missing_dependencies(
    depends: &[FieldId],
    field_map: &FieldMap,
    record: &RawRecord,
) -> Vec<FieldId> {
    depends
        .iter()
        .filter(|field_id| {
            field_map
                .get(*field_id)
                .map_or(true, |column| !record.contains_key(column))
        })
        .cloned()
        .collect()
}

/// Fill a template from the known data of one record.
///
/// Returns `None` when any dependency is missing from `record`; the field
/// must then be skipped for this record.
pub fn render_record_prompt(
    template: &str,
    depends: &[FieldId],
    field_map: &FieldMap,
    record: &RawRecord,
) -> Option<String> {
    if !missing_dependencies(depends, field_map, record).is_empty() {
        return None;
    }
    Some(render_backfill_prompt(template, depends, field_map, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map() -> FieldMap {
        [
            (FieldId::from("f1"), "col_a".to_string()),
            (FieldId::from("f2"), "col_b".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn row(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap_or_default()
    }

    fn depends() -> Vec<FieldId> {
        vec!["f1".into(), "f2".into()]
    }

    #[test]
    fn test_substitutes_every_dependency() {
        let prompt = render_backfill_prompt(
            "Hello {f1}, age {f2}",
            &depends(),
            &map(),
            &row(json!({"col_a": "Bob", "col_b": 30})),
        );
        assert_eq!(prompt, "Hello Bob, age 30");
    }

    #[test]
    fn test_missing_column_renders_empty_in_backfill() {
        let prompt = render_backfill_prompt(
            "Hello {f1}, age {f2}",
            &depends(),
            &map(),
            &row(json!({"col_a": "Bob"})),
        );
        assert_eq!(prompt, "Hello Bob, age ");
    }

    #[test]
    fn test_unknown_field_stays_literal_in_backfill() {
        let prompt = render_backfill_prompt(
            "{f1} and {fGone}",
            &["f1".into(), "fGone".into()],
            &map(),
            &row(json!({"col_a": "x"})),
        );
        assert_eq!(prompt, "x and {fGone}");
    }

    #[test]
    fn test_repeated_placeholder_is_replaced_everywhere() {
        let prompt = render_backfill_prompt(
            "{f1}/{f1}",
            &["f1".into()],
            &map(),
            &row(json!({"col_a": "x"})),
        );
        assert_eq!(prompt, "x/x");
    }

    #[test]
    fn test_record_prompt_skips_on_missing_dependency() {
        assert_eq!(
            render_record_prompt(
                "Hello {f1}, age {f2}",
                &depends(),
                &map(),
                &row(json!({"col_a": "Bob"})),
            ),
            None
        );
        assert_eq!(
            render_record_prompt(
                "Hello {f1}, age {f2}",
                &depends(),
                &map(),
                &row(json!({"col_a": "Bob", "col_b": null})),
            )
            .as_deref(),
            Some("Hello Bob, age ")
        );
    }

    #[test]
    fn test_value_text_forms() {
        assert_eq!(value_to_prompt_text(&json!(null)), "");
        assert_eq!(value_to_prompt_text(&json!(true)), "true");
        assert_eq!(value_to_prompt_text(&json!(2.5)), "2.5");
        assert_eq!(value_to_prompt_text(&json!(["a", null, 3])), "a,,3");
        assert_eq!(value_to_prompt_text(&json!({"k": 1})), r#"{"k":1}"#);
    }
}
