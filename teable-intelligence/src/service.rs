//! Intelligence Service
//!
//! Generates AI field values for three triggers:
//! - enabling intelligence on a field backfills every row of the table,
//! - updating dependency cells regenerates the affected fields of those records,
//! - creating records generates every intelligence field of the new records.

use crate::changes::{affected_fields, intelligence_fields, record_data_from_changes};
use crate::dependency::{topological_order, DependencyOrder};
use crate::metrics::with_metrics;
use crate::prompt::{missing_dependencies, render_backfill_prompt, render_record_prompt};
use crate::registry::{RunKey, RunRegistry, RunTicket};
use crate::retry::with_retry;
use futures_util::future::{join_all, try_join_all};
use std::sync::Arc;
use teable_core::{
    db_field_names_for, field_map, CellChange, Field, FieldChangeIndex, FieldId, FieldMap,
    IntelligenceConfig, IntelligenceOptions, RawRecord, RecordId, StorageError, TableId,
    TeableError, TeableResult, ThresholdConfig, RECORD_ID_COLUMN, SYSTEM_DB_FIELD_NAMES,
};
use teable_events::CreatedRecord;
use teable_llm::{AiTask, ModelRegistry, TextStream};
use teable_storage::{PageRequest, RecordUpdate, TableStore};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Counts of one trigger's cell generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Cells written with generated text.
    pub generated: usize,
    /// Cells written with the failure placeholder.
    pub failed: usize,
    /// Cells left untouched (missing dependency data or invalid options).
    pub skipped: usize,
}

impl GenerationSummary {
    fn merge(&mut self, other: GenerationSummary) {
        self.generated += other.generated;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// How a backfill run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every page was processed.
    Completed(GenerationSummary),
    /// A newer run for the same field took over.
    Cancelled,
    /// The options do not allow a backfill; nothing was done.
    Skipped,
}

impl RunOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "invalid",
        }
    }
}

/// Everything a backfill batch needs besides its rows.
struct BackfillPlan<'a> {
    table_id: &'a TableId,
    target: &'a Field,
    prompt: &'a str,
    depends: &'a [FieldId],
    field_map: FieldMap,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Orchestrates prompt rendering, generation and write-back.
///
/// Cloning is cheap; every clone shares the store, the model registry and
/// the run registry.
#[derive(Clone)]
pub struct IntelligenceService {
    store: Arc<dyn TableStore>,
    models: Arc<ModelRegistry>,
    runs: Arc<RunRegistry>,
    config: IntelligenceConfig,
    thresholds: ThresholdConfig,
}

impl std::fmt::Debug for IntelligenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntelligenceService")
            .field("active_runs", &self.runs.active_count())
            .field("config", &self.config)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl IntelligenceService {
    pub fn new(
        store: Arc<dyn TableStore>,
        models: Arc<ModelRegistry>,
        runs: Arc<RunRegistry>,
        config: IntelligenceConfig,
        thresholds: ThresholdConfig,
    ) -> Self {
        Self {
            store,
            models,
            runs,
            config,
            thresholds,
        }
    }

    pub fn runs(&self) -> &Arc<RunRegistry> {
        &self.runs
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn config(&self) -> &IntelligenceConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Generate text for one prompt with the coding model.
    pub async fn generate_text(&self, prompt: &str) -> TeableResult<String> {
        let provider = self.models.resolve(AiTask::Coding)?;
        provider.generate(prompt).await
    }

    /// Stream text deltas for one prompt with the coding model.
    pub async fn generate_stream(&self, prompt: &str) -> TeableResult<TextStream> {
        let provider = self.models.resolve(AiTask::Coding)?;
        tracing::debug!(
            provider = provider.provider_name(),
            model = provider.model_id(),
            "Starting streamed generation"
        );
        provider.generate_stream(prompt).await
    }

    // ------------------------------------------------------------------------
    // Backfill
    // ------------------------------------------------------------------------

    /// Fill a field for every row of its table.
    ///
    /// Any run already active for the same field is cancelled first. A
    /// superseded run ends with `Ok(RunOutcome::Cancelled)`.
    ///
    /// # Arguments
    /// * `table_id` - Table owning the field
    /// * `field_id` - Field to fill
    /// * `options` - Intelligence options to apply
    ///
    /// # Returns
    /// * `Ok(RunOutcome)` - Completed, cancelled or skipped
    /// * `Err(TeableError)` - A storage error or a batch that failed every retry
    pub async fn trigger_create(
        &self,
        table_id: &TableId,
        field_id: &FieldId,
        options: &IntelligenceOptions,
    ) -> TeableResult<RunOutcome> {
        let ticket = self
            .runs
            .start(RunKey::new(table_id.clone(), field_id.clone()));

        let result = if options.is_valid_for_backfill() {
            self.run_backfill(&ticket, table_id, field_id, options)
                .await
                .map(RunOutcome::Completed)
        } else {
            tracing::debug!(
                table_id = %table_id,
                field_id = %field_id,
                "Intelligence options not usable for backfill, skipping"
            );
            Ok(RunOutcome::Skipped)
        };

        match result {
            Ok(outcome) => {
                if let RunOutcome::Completed(summary) = outcome {
                    tracing::info!(
                        table_id = %table_id,
                        field_id = %field_id,
                        generated = summary.generated,
                        failed = summary.failed,
                        "Intelligence backfill completed"
                    );
                }
                with_metrics(|m| m.record_run(outcome.label()));
                Ok(outcome)
            }
            Err(TeableError::Cancelled) => {
                tracing::info!(
                    table_id = %table_id,
                    field_id = %field_id,
                    generation = ticket.generation(),
                    "Intelligence backfill cancelled"
                );
                with_metrics(|m| m.record_run(RunOutcome::Cancelled.label()));
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                tracing::error!(
                    table_id = %table_id,
                    field_id = %field_id,
                    error = %e,
                    "Intelligence backfill failed"
                );
                with_metrics(|m| m.record_run("failed"));
                Err(e)
            }
        }
    }

    async fn run_backfill(
        &self,
        ticket: &RunTicket,
        table_id: &TableId,
        field_id: &FieldId,
        options: &IntelligenceOptions,
    ) -> TeableResult<GenerationSummary> {
        let fields = self.store.fields(table_id).await?;
        let meta = self.store.table_meta(table_id).await?;
        let target = fields
            .iter()
            .find(|field| &field.id == field_id)
            .ok_or_else(|| StorageError::FieldNotFound {
                name: field_id.to_string(),
            })?;

        let depends = options.depends();
        let mut selected_ids = depends.to_vec();
        selected_ids.push(field_id.clone());
        let mut columns = db_field_names_for(&fields, &selected_ids);
        columns.extend(SYSTEM_DB_FIELD_NAMES.iter().map(|name| name.to_string()));

        let plan = BackfillPlan {
            table_id,
            target,
            prompt: options.prompt_template().unwrap_or_default(),
            depends,
            field_map: field_map(&fields),
        };

        let page_size = self.thresholds.calc_chunk_size.max(1);
        let row_count = self.store.row_count(&meta.db_table_name).await?;
        let pages = row_count.div_ceil(page_size);
        tracing::info!(
            table_id = %table_id,
            field_id = %field_id,
            rows = row_count,
            pages = pages,
            "Starting intelligence backfill"
        );

        let mut summary = GenerationSummary::default();
        for page in 0..pages {
            ticket.ensure_active()?;
            let rows = self
                .store
                .records_page(
                    &meta.db_table_name,
                    PageRequest {
                        columns: &columns,
                        page,
                        page_size,
                    },
                )
                .await?;

            for batch in rows.chunks(self.config.small_batch_size.max(1)) {
                ticket.ensure_active()?;
                let batch_summary = with_retry(&self.config, "backfill_batch", || {
                    self.process_backfill_batch(ticket, &plan, batch)
                })
                .await?;
                summary.merge(batch_summary);
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        Ok(summary)
    }

    /// Thinking placeholders, concurrent generation, then results.
    async fn process_backfill_batch(
        &self,
        ticket: &RunTicket,
        plan: &BackfillPlan<'_>,
        rows: &[RawRecord],
    ) -> TeableResult<GenerationSummary> {
        let mut summary = GenerationSummary::default();
        let mut jobs: Vec<(RecordId, String)> = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get(RECORD_ID_COLUMN).and_then(|id| id.as_str()) {
                Some(id) => jobs.push((
                    RecordId::from(id),
                    render_backfill_prompt(plan.prompt, plan.depends, &plan.field_map, row),
                )),
                None => {
                    tracing::warn!(
                        table_id = %plan.table_id,
                        field_id = %plan.target.id,
                        "Row without record id, skipping"
                    );
                    summary.skipped += 1;
                }
            }
        }

        ticket.ensure_current("thinking")?;
        try_join_all(jobs.iter().map(|(record_id, _)| {
            self.write_cell(plan.table_id, record_id, plan.target, &self.config.thinking_message)
        }))
        .await?;

        let results = join_all(jobs.iter().map(|(record_id, prompt)| async move {
            let result = self.generate_text(prompt).await;
            if let Err(e) = &result {
                tracing::error!(
                    table_id = %plan.table_id,
                    field_id = %plan.target.id,
                    record_id = %record_id,
                    error = %e,
                    "Generation failed for record"
                );
            }
            result
        }))
        .await;

        ticket.ensure_current("result")?;
        try_join_all(jobs.iter().zip(&results).map(|((record_id, _), result)| {
            let value = match result {
                Ok(text) => text.as_str(),
                Err(_) => self.config.failure_message.as_str(),
            };
            self.write_cell(plan.table_id, record_id, plan.target, value)
        }))
        .await?;

        for result in &results {
            let outcome = if result.is_ok() {
                summary.generated += 1;
                "success"
            } else {
                summary.failed += 1;
                "failure"
            };
            with_metrics(|m| m.record_generation("backfill", outcome));
        }

        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // Incremental update and record creation
    // ------------------------------------------------------------------------

    /// Regenerate the intelligence fields whose dependencies changed.
    ///
    /// # Arguments
    /// * `table_id` - Table the changes belong to
    /// * `changes` - Cell changes of one update operation
    pub async fn trigger_update_records(
        &self,
        table_id: &TableId,
        changes: &[CellChange],
    ) -> TeableResult<GenerationSummary> {
        let index = FieldChangeIndex::from_changes(changes);
        if index.is_empty() {
            return Ok(GenerationSummary::default());
        }

        let fields = self.store.fields(table_id).await?;
        let affected = affected_fields(&intelligence_fields(&fields), &index);
        if affected.is_empty() {
            tracing::debug!(table_id = %table_id, "No intelligence field affected by update");
            return Ok(GenerationSummary::default());
        }

        let ordered = self.ordered_fields(table_id, &affected);
        let field_map = field_map(&fields);
        tracing::debug!(
            table_id = %table_id,
            fields = ordered.len(),
            records = index.record_ids().len(),
            "Regenerating intelligence fields"
        );

        let mut summary = GenerationSummary::default();
        for batch in index.record_ids().chunks(self.config.record_batch_size.max(1)) {
            for record_id in batch {
                let data = record_data_from_changes(record_id, &field_map, &index);
                let record_summary = self
                    .process_record_fields(table_id, record_id, &ordered, &field_map, data, "update")
                    .await?;
                summary.merge(record_summary);
            }
            tokio::time::sleep(self.config.record_batch_delay).await;
        }
        Ok(summary)
    }

    /// Generate every intelligence field of newly created records.
    pub async fn trigger_create_records(
        &self,
        table_id: &TableId,
        records: &[CreatedRecord],
    ) -> TeableResult<GenerationSummary> {
        if records.is_empty() {
            return Ok(GenerationSummary::default());
        }

        let fields = self.store.fields(table_id).await?;
        let enabled = intelligence_fields(&fields);
        if enabled.is_empty() {
            return Ok(GenerationSummary::default());
        }

        let ordered = self.ordered_fields(table_id, &enabled);
        let field_map = field_map(&fields);

        let mut summary = GenerationSummary::default();
        for batch in records.chunks(self.config.record_batch_size.max(1)) {
            for record in batch {
                let data: RawRecord = record
                    .fields
                    .iter()
                    .filter_map(|(field_id, value)| {
                        field_map
                            .get(field_id)
                            .map(|column| (column.clone(), value.clone()))
                    })
                    .collect();
                let record_summary = self
                    .process_record_fields(table_id, &record.id, &ordered, &field_map, data, "create")
                    .await?;
                summary.merge(record_summary);
            }
            tokio::time::sleep(self.config.record_batch_delay).await;
        }
        Ok(summary)
    }

    fn ordered_fields(&self, table_id: &TableId, fields: &[Field]) -> Vec<Field> {
        let DependencyOrder { ordered, omitted } = topological_order(fields);
        if !omitted.is_empty() {
            tracing::warn!(
                table_id = %table_id,
                field_ids = ?omitted,
                "Intelligence fields on a dependency cycle are skipped"
            );
        }
        ordered
    }

    /// Fields of one record, strictly in order.
    ///
    /// Generated text joins `data` so later fields can reference it.
    async fn process_record_fields(
        &self,
        table_id: &TableId,
        record_id: &RecordId,
        ordered: &[Field],
        field_map: &FieldMap,
        mut data: RawRecord,
        path: &'static str,
    ) -> TeableResult<GenerationSummary> {
        let mut summary = GenerationSummary::default();

        for field in ordered {
            let Some(intelligence) = field.intelligence().filter(|i| i.is_valid_for_record()) else {
                summary.skipped += 1;
                continue;
            };
            let template = intelligence.prompt_template().unwrap_or_default();
            let depends = intelligence.depends();

            let Some(prompt) = render_record_prompt(template, depends, field_map, &data) else {
                tracing::warn!(
                    table_id = %table_id,
                    record_id = %record_id,
                    field_id = %field.id,
                    missing = ?missing_dependencies(depends, field_map, &data),
                    "Missing dependency data, skipping field"
                );
                summary.skipped += 1;
                with_metrics(|m| m.record_generation(path, "skipped"));
                continue;
            };

            let generated = match self.generate_text(&prompt).await {
                Ok(text) => self
                    .write_cell(table_id, record_id, field, &text)
                    .await
                    .map(|_| text),
                Err(e) => Err(e),
            };

            match generated {
                Ok(text) => {
                    data.insert(field.db_field_name.clone(), text.into());
                    summary.generated += 1;
                    with_metrics(|m| m.record_generation(path, "success"));
                }
                Err(e) => {
                    tracing::error!(
                        table_id = %table_id,
                        record_id = %record_id,
                        field_id = %field.id,
                        error = %e,
                        "Error generating field value"
                    );
                    self.write_cell(table_id, record_id, field, &self.config.failure_message)
                        .await?;
                    summary.failed += 1;
                    with_metrics(|m| m.record_generation(path, "failure"));
                }
            }
        }

        Ok(summary)
    }

    async fn write_cell(
        &self,
        table_id: &TableId,
        record_id: &RecordId,
        field: &Field,
        value: &str,
    ) -> TeableResult<()> {
        self.store
            .update_record(table_id, record_id, RecordUpdate::single(field.name.as_str(), value))
            .await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use teable_core::TableMeta;
    use teable_llm::MockTextGenerator;
    use teable_storage::InMemoryTableStore;

    fn name_bio_fields() -> Vec<Field> {
        vec![
            Field::new("fldName", "Name", "name"),
            Field::new("fldBio", "Bio", "bio").with_intelligence(IntelligenceOptions {
                enabled: Some(true),
                prompt: Some("Write a bio for {fldName}".to_string()),
                dynamic_depends: Some(vec!["fldName".into()]),
                ..Default::default()
            }),
        ]
    }

    fn setup(mock: MockTextGenerator) -> (Arc<InMemoryTableStore>, IntelligenceService) {
        let store = Arc::new(InMemoryTableStore::new());
        store
            .create_table(
                "tblPeople",
                TableMeta {
                    base_id: "bseA".into(),
                    db_table_name: "people".to_string(),
                },
                name_bio_fields(),
            )
            .unwrap();
        store
            .insert_record(&"tblPeople".into(), "rec1", [("fldName".into(), json!("Alice"))])
            .unwrap();
        let service = IntelligenceService::new(
            store.clone(),
            Arc::new(ModelRegistry::single(Arc::new(mock))),
            Arc::new(RunRegistry::new()),
            IntelligenceConfig::default().without_delays(),
            ThresholdConfig::default(),
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_update_path_generates_bio() {
        let mock = MockTextGenerator::new("m").with_responder(|_| Ok("Alice is great".to_string()));
        let (store, service) = setup(mock.clone());
        let table: TableId = "tblPeople".into();

        let summary = service
            .trigger_update_records(
                &table,
                &[CellChange::new("fldName", "rec1", Value::Null, json!("Alice"))],
            )
            .await
            .unwrap();

        assert_eq!(summary.generated, 1);
        assert_eq!(mock.prompts(), vec!["Write a bio for Alice".to_string()]);
        assert_eq!(
            store.cell(&table, &"rec1".into(), &"fldBio".into()),
            Some(json!("Alice is great"))
        );
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_update_with_empty_value_does_nothing() {
        let mock = MockTextGenerator::new("m");
        let (store, service) = setup(mock.clone());

        let summary = service
            .trigger_update_records(
                &"tblPeople".into(),
                &[CellChange::new("fldName", "rec1", Value::Null, json!(""))],
            )
            .await
            .unwrap();

        assert_eq!(summary, GenerationSummary::default());
        assert_eq!(mock.call_count(), 0);
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_writes_placeholder() {
        let mock = MockTextGenerator::new("m").failing_on("Alice");
        let (store, service) = setup(mock);

        let summary = service
            .trigger_update_records(
                &"tblPeople".into(),
                &[CellChange::new("fldName", "rec1", Value::Null, json!("Alice"))],
            )
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(
            store.cell_history(&"rec1".into(), "Bio"),
            vec![json!("思考失败")]
        );
    }

    #[tokio::test]
    async fn test_create_path_skips_field_with_missing_dependency() {
        let mock = MockTextGenerator::new("m");
        let (store, service) = setup(mock.clone());

        let summary = service
            .trigger_create_records(
                &"tblPeople".into(),
                &[CreatedRecord {
                    id: "rec9".into(),
                    fields: Default::default(),
                }],
            )
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(mock.call_count(), 0);
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_backfill_options_are_skipped() {
        let (_, service) = setup(MockTextGenerator::new("m"));
        let outcome = service
            .trigger_create(&"tblPeople".into(), &"fldBio".into(), &IntelligenceOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Skipped);
        assert_eq!(service.runs().active_count(), 0);
    }
}
