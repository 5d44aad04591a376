//! Teable Test Utilities
//!
//! Shared test infrastructure for the Teable intelligence workspace:
//! - Proptest generators for fields and cell changes
//! - Fixtures for tables, stores and services
//! - Assertions for Teable-specific results

pub use teable_core::{
    CellChange, Field, FieldId, IntelligenceConfig, IntelligenceOptions, RecordId, StorageError,
    TableId, TableMeta, TeableError, TeableResult, ThresholdConfig, ValidationError,
};
pub use teable_llm::{MockTextGenerator, ModelRegistry};
pub use teable_storage::InMemoryTableStore;

use serde_json::Value;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Teable pipeline inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a field id of the form `fld<N>`.
    pub fn arb_field_id(max: usize) -> impl Strategy<Value = FieldId> {
        (0..max.max(1)).prop_map(|n| FieldId::from(format!("fld{n}")))
    }

    /// Generate a cell value the way the grid sends them.
    pub fn arb_cell_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(Value::String(String::new())),
            "[a-z]{1,8}".prop_map(Value::String),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    /// Generate a cell change on a small id space so changes collide.
    pub fn arb_cell_change() -> impl Strategy<Value = CellChange> {
        (
            arb_field_id(4),
            (0..4usize).prop_map(|n| RecordId::from(format!("rec{n}"))),
            arb_cell_value(),
            arb_cell_value(),
        )
            .prop_map(|(field_id, record_id, old_value, new_value)| CellChange {
                field_id,
                record_id,
                old_value,
                new_value,
            })
    }

    /// Generate acyclic intelligence fields: `fld<i>` may only depend on
    /// lower-numbered fields. Output is shuffled.
    pub fn arb_intelligence_dag() -> impl Strategy<Value = Vec<Field>> {
        (1usize..10)
            .prop_flat_map(|n| {
                proptest::collection::vec(
                    proptest::collection::vec(any::<prop::sample::Index>(), 0..3),
                    n,
                )
            })
            .prop_map(|edges| {
                edges
                    .iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let depends: Vec<FieldId> = if i == 0 {
                            Vec::new()
                        } else {
                            deps.iter()
                                .map(|ix| FieldId::from(format!("fld{}", ix.index(i))))
                                .collect()
                        };
                        fixtures::intelligence_field(&format!("fld{i}"), &depends)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use std::sync::Arc;
    use teable_intelligence::{IntelligenceService, RunRegistry};

    pub const PEOPLE_TABLE: &str = "tblPeople";
    pub const PEOPLE_DB_TABLE: &str = "bse_a.people";

    /// Intelligence options with every member needed for generation.
    pub fn intelligence_options(prompt: &str, depends: &[FieldId]) -> IntelligenceOptions {
        IntelligenceOptions {
            enabled: Some(true),
            prompt: Some(prompt.to_string()),
            dynamic: Some(true),
            dynamic_depends: Some(depends.to_vec()),
            ..Default::default()
        }
    }

    /// An enabled intelligence field whose column and name follow its id.
    pub fn intelligence_field(id: &str, depends: &[FieldId]) -> Field {
        let prompt = depends
            .iter()
            .map(|d| format!("{{{d}}}"))
            .collect::<Vec<_>>()
            .join(" ");
        Field::new(id, id, format!("col_{id}"))
            .with_intelligence(intelligence_options(&format!("Summarize {prompt}"), depends))
    }

    /// `Name` plus an AI `Bio` field prompted with "Write a bio for {fldName}".
    pub fn name_bio_fields() -> Vec<Field> {
        vec![
            Field::new("fldName", "Name", "name"),
            Field::new("fldBio", "Bio", "bio").with_intelligence(intelligence_options(
                "Write a bio for {fldName}",
                &["fldName".into()],
            )),
        ]
    }

    /// The `Bio` field without intelligence, as it exists before enabling.
    pub fn plain_name_bio_fields() -> Vec<Field> {
        vec![
            Field::new("fldName", "Name", "name"),
            Field::new("fldBio", "Bio", "bio"),
        ]
    }

    /// Store holding the people table with `fields` and one row per name.
    ///
    /// Rows get ids `rec1`, `rec2`, ... in order.
    pub fn people_store(fields: Vec<Field>, names: &[&str]) -> Arc<InMemoryTableStore> {
        let store = Arc::new(InMemoryTableStore::new());
        let table: TableId = PEOPLE_TABLE.into();
        store
            .create_table(
                table.clone(),
                TableMeta {
                    base_id: "bseA".into(),
                    db_table_name: PEOPLE_DB_TABLE.to_string(),
                },
                fields,
            )
            .expect("create people table");
        for (i, name) in names.iter().enumerate() {
            store
                .insert_record(
                    &table,
                    format!("rec{}", i + 1),
                    [(FieldId::from("fldName"), Value::from(*name))],
                )
                .expect("insert person");
        }
        store
    }

    /// Pipeline settings with every delay removed.
    pub fn fast_config() -> IntelligenceConfig {
        IntelligenceConfig::default().without_delays()
    }

    /// Service over `store` answering every prompt with `generator`.
    pub fn service(
        store: Arc<InMemoryTableStore>,
        generator: MockTextGenerator,
        config: IntelligenceConfig,
        thresholds: ThresholdConfig,
    ) -> IntelligenceService {
        IntelligenceService::new(
            store,
            Arc::new(ModelRegistry::single(Arc::new(generator))),
            Arc::new(RunRegistry::new()),
            config,
            thresholds,
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Teable results.

    use super::*;

    /// Assert that a TeableResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TeableResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a TeableResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &TeableResult<T>) {
        match result {
            Err(TeableError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a TeableResult is an Llm error.
    #[track_caller]
    pub fn assert_llm_error<T: std::fmt::Debug>(result: &TeableResult<T>) {
        match result {
            Err(TeableError::Llm(_)) => {}
            other => panic!("Expected Llm error, got: {:?}", other),
        }
    }

    /// Assert that a TeableResult is a dependency cycle naming `expected`.
    #[track_caller]
    pub fn assert_dependency_cycle<T: std::fmt::Debug>(
        result: &Result<T, ValidationError>,
        expected: &[&str],
    ) {
        match result {
            Err(ValidationError::DependencyCycle { field_ids }) => {
                let mut got: Vec<&str> = field_ids.iter().map(FieldId::as_str).collect();
                got.sort_unstable();
                let mut want = expected.to_vec();
                want.sort_unstable();
                assert_eq!(got, want, "Wrong fields in dependency cycle");
            }
            other => panic!("Expected DependencyCycle, got: {:?}", other),
        }
    }

    /// Assert the values written to one cell, in order.
    #[track_caller]
    pub fn assert_cell_history(
        store: &InMemoryTableStore,
        record_id: &str,
        field_name: &str,
        expected: &[&str],
    ) {
        let got = store.cell_history(&record_id.into(), field_name);
        let want: Vec<Value> = expected.iter().map(|v| Value::from(*v)).collect();
        assert_eq!(got, want, "Unexpected writes to {record_id}.{field_name}");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_people_store_fixture() {
        let store = fixtures::people_store(fixtures::name_bio_fields(), &["Alice", "Bob"]);
        assert_eq!(
            store.cell(&fixtures::PEOPLE_TABLE.into(), &"rec2".into(), &"fldName".into()),
            Some(Value::from("Bob"))
        );
        assert_eq!(
            store.cell(&fixtures::PEOPLE_TABLE.into(), &"rec1".into(), &"fldBio".into()),
            Some(Value::Null)
        );
    }

    #[test]
    fn test_intelligence_field_fixture() {
        let field = fixtures::intelligence_field("fldC", &["fldA".into(), "fldB".into()]);
        let options = field.intelligence().unwrap();
        assert!(options.is_valid_for_backfill());
        assert_eq!(options.prompt.as_deref(), Some("Summarize {fldA} {fldB}"));
    }

    #[test]
    fn test_assertion_dependency_cycle() {
        let result: Result<(), ValidationError> = Err(ValidationError::DependencyCycle {
            field_ids: vec!["fldB".into(), "fldA".into()],
        });
        assertions::assert_dependency_cycle(&result, &["fldA", "fldB"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_dag_fields_are_enabled(fields in generators::arb_intelligence_dag()) {
            for field in &fields {
                prop_assert!(field.is_intelligence_enabled());
            }
        }

        #[test]
        fn prop_generated_change_ids_are_small(change in generators::arb_cell_change()) {
            prop_assert!(change.field_id.as_str().starts_with("fld"));
            prop_assert!(change.record_id.as_str().starts_with("rec"));
        }
    }
}
