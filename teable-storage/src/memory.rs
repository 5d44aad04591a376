//! In-memory table store for tests and local runs.

use crate::{row_has_selected_value, PageRequest, RecordUpdate, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use teable_core::{
    Field, FieldId, RawRecord, RecordId, StorageError, TableId, TableMeta, TeableResult,
    AUTO_NUMBER_COLUMN, RECORD_ID_COLUMN,
};

#[derive(Debug, Clone)]
struct TableData {
    meta: TableMeta,
    fields: Vec<Field>,
    rows: Vec<RawRecord>,
    next_auto_number: u64,
}

/// One successful `update_record` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateLogEntry {
    pub table_id: TableId,
    pub record_id: RecordId,
    pub update: RecordUpdate,
}

/// In-memory [`TableStore`].
///
/// Every successful update is appended to a log so tests can assert on
/// the exact write sequence. `fail_next_updates(n)` makes the next `n`
/// update calls fail.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<TableId, TableData>>,
    updates: RwLock<Vec<UpdateLogEntry>>,
    failing_updates: AtomicUsize,
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::LockPoisoned
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a table.
    pub fn create_table(
        &self,
        table_id: impl Into<TableId>,
        meta: TableMeta,
        fields: Vec<Field>,
    ) -> TeableResult<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.insert(
            table_id.into(),
            TableData {
                meta,
                fields,
                rows: Vec::new(),
                next_auto_number: 1,
            },
        );
        Ok(())
    }

    /// Append a field to an existing table.
    pub fn add_field(&self, table_id: &TableId, field: Field) -> TeableResult<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let table = tables
            .get_mut(table_id)
            .ok_or_else(|| StorageError::TableNotFound {
                table_id: table_id.clone(),
            })?;
        table.fields.retain(|f| f.id != field.id);
        table.fields.push(field);
        Ok(())
    }

    /// Insert a row. `values` are keyed by field id; unknown ids are ignored.
    pub fn insert_record(
        &self,
        table_id: &TableId,
        record_id: impl Into<RecordId>,
        values: impl IntoIterator<Item = (FieldId, Value)>,
    ) -> TeableResult<()> {
        let record_id = record_id.into();
        let mut tables = self.tables.write().map_err(poisoned)?;
        let table = tables
            .get_mut(table_id)
            .ok_or_else(|| StorageError::TableNotFound {
                table_id: table_id.clone(),
            })?;

        let mut row = RawRecord::new();
        row.insert(
            RECORD_ID_COLUMN.to_string(),
            Value::String(record_id.to_string()),
        );
        row.insert(
            AUTO_NUMBER_COLUMN.to_string(),
            Value::from(table.next_auto_number),
        );
        table.next_auto_number += 1;
        for field in &table.fields {
            row.insert(field.db_field_name.clone(), Value::Null);
        }
        for (field_id, value) in values {
            if let Some(field) = table.fields.iter().find(|f| f.id == field_id) {
                row.insert(field.db_field_name.clone(), value);
            }
        }
        table.rows.push(row);
        Ok(())
    }

    /// Current value of one cell.
    pub fn cell(&self, table_id: &TableId, record_id: &RecordId, field_id: &FieldId) -> Option<Value> {
        let tables = self.tables.read().ok()?;
        let table = tables.get(table_id)?;
        let column = &table.fields.iter().find(|f| &f.id == field_id)?.db_field_name;
        table
            .rows
            .iter()
            .find(|row| row_id_matches(row, record_id))
            .and_then(|row| row.get(column).cloned())
    }

    /// Successful updates in call order.
    pub fn updates(&self) -> Vec<UpdateLogEntry> {
        self.updates.read().map(|u| u.clone()).unwrap_or_default()
    }

    /// Values written to one cell, in call order.
    pub fn cell_history(&self, record_id: &RecordId, field_name: &str) -> Vec<Value> {
        self.updates()
            .into_iter()
            .filter(|entry| &entry.record_id == record_id)
            .filter_map(|entry| entry.update.fields.get(field_name).cloned())
            .collect()
    }

    /// Fail the next `count` calls to `update_record`.
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn row_id_matches(row: &RawRecord, record_id: &RecordId) -> bool {
    row.get(RECORD_ID_COLUMN).and_then(Value::as_str) == Some(record_id.as_str())
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn fields(&self, table_id: &TableId) -> TeableResult<Vec<Field>> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables
            .get(table_id)
            .map(|t| t.fields.clone())
            .ok_or_else(|| {
                StorageError::TableNotFound {
                    table_id: table_id.clone(),
                }
                .into()
            })
    }

    async fn table_meta(&self, table_id: &TableId) -> TeableResult<TableMeta> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables
            .get(table_id)
            .map(|t| t.meta.clone())
            .ok_or_else(|| {
                StorageError::TableNotFound {
                    table_id: table_id.clone(),
                }
                .into()
            })
    }

    async fn row_count(&self, db_table_name: &str) -> TeableResult<usize> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables
            .values()
            .find(|t| t.meta.db_table_name == db_table_name)
            .map(|t| t.rows.len())
            .ok_or_else(|| {
                StorageError::QueryFailed {
                    reason: format!("relation {db_table_name} does not exist"),
                }
                .into()
            })
    }

    async fn records_page(
        &self,
        db_table_name: &str,
        request: PageRequest<'_>,
    ) -> TeableResult<Vec<RawRecord>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let table = tables
            .values()
            .find(|t| t.meta.db_table_name == db_table_name)
            .ok_or_else(|| StorageError::QueryFailed {
                reason: format!("relation {db_table_name} does not exist"),
            })?;

        let mut rows: Vec<&RawRecord> = table
            .rows
            .iter()
            .filter(|row| row_has_selected_value(row, request.columns))
            .collect();
        rows.sort_by_key(|row| row.get(AUTO_NUMBER_COLUMN).and_then(Value::as_u64));

        Ok(rows
            .into_iter()
            .skip(request.offset())
            .take(request.page_size)
            .map(|row| {
                request
                    .columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect()
            })
            .collect())
    }

    async fn update_record(
        &self,
        table_id: &TableId,
        record_id: &RecordId,
        update: RecordUpdate,
    ) -> TeableResult<()> {
        if self.take_injected_failure() {
            return Err(StorageError::UpdateFailed {
                record_id: record_id.clone(),
                reason: "injected failure".to_string(),
            }
            .into());
        }

        {
            let mut tables = self.tables.write().map_err(poisoned)?;
            let table = tables
                .get_mut(table_id)
                .ok_or_else(|| StorageError::TableNotFound {
                    table_id: table_id.clone(),
                })?;

            let mut columns = Vec::with_capacity(update.fields.len());
            for name in update.fields.keys() {
                let field = table
                    .fields
                    .iter()
                    .find(|f| &f.name == name)
                    .ok_or_else(|| StorageError::FieldNotFound { name: name.clone() })?;
                columns.push(field.db_field_name.clone());
            }

            let row = table
                .rows
                .iter_mut()
                .find(|row| row_id_matches(row, record_id))
                .ok_or_else(|| StorageError::RecordNotFound {
                    table_id: table_id.clone(),
                    record_id: record_id.clone(),
                })?;
            for (column, value) in columns.into_iter().zip(update.fields.values()) {
                row.insert(column, value.clone());
            }
        }

        tracing::trace!(table_id = %table_id, record_id = %record_id, "record updated");
        self.updates.write().map_err(poisoned)?.push(UpdateLogEntry {
            table_id: table_id.clone(),
            record_id: record_id.clone(),
            update,
        });
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
