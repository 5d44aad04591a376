//! Teable Storage - Table Store Trait and In-Memory Implementation
//!
//! Defines the narrow slice of the table/record service the intelligence
//! pipeline consumes. The Postgres implementation lives in teable-api.

pub mod memory;

pub use memory::{InMemoryTableStore, UpdateLogEntry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teable_core::{Field, RawRecord, RecordId, TableId, TableMeta, TeableResult};

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Cell values to write to one record, keyed by field display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RecordUpdate {
    /// Update of a single cell.
    pub fn single(field_name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(field_name.into(), value.into());
        Self { fields }
    }
}

/// Rows selected by one page request.
///
/// `columns` are physical column names; rows where every non-system
/// column in `columns` is null are excluded. Rows are ordered by the
/// table's auto number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub columns: &'a [String],
    /// Zero-based page index.
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest<'_> {
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

// ============================================================================
// TABLE STORE TRAIT
// ============================================================================

/// Async access to table metadata, raw rows and record updates.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// All fields of a table, in table order.
    async fn fields(&self, table_id: &TableId) -> TeableResult<Vec<Field>>;

    /// Base id and physical table name.
    async fn table_meta(&self, table_id: &TableId) -> TeableResult<TableMeta>;

    /// Unfiltered row count of a physical table.
    async fn row_count(&self, db_table_name: &str) -> TeableResult<usize>;

    /// One page of raw rows.
    async fn records_page(
        &self,
        db_table_name: &str,
        request: PageRequest<'_>,
    ) -> TeableResult<Vec<RawRecord>>;

    /// Write cell values through the record service.
    async fn update_record(
        &self,
        table_id: &TableId,
        record_id: &RecordId,
        update: RecordUpdate,
    ) -> TeableResult<()>;
}

/// True when a raw row matches the page filter for `columns`.
pub fn row_has_selected_value(row: &RawRecord, columns: &[String]) -> bool {
    columns
        .iter()
        .filter(|column| !teable_core::SYSTEM_DB_FIELD_NAMES.contains(&column.as_str()))
        .any(|column| row.get(column).is_some_and(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_update() {
        let update = RecordUpdate::single("Bio", "hello");
        assert_eq!(update.fields.get("Bio"), Some(&json!("hello")));
    }

    #[test]
    fn test_page_offset() {
        let columns = vec!["a".to_string()];
        let req = PageRequest {
            columns: &columns,
            page: 3,
            page_size: 50,
        };
        assert_eq!(req.offset(), 150);
    }

    #[test]
    fn test_row_filter_ignores_system_columns() {
        let columns = vec!["__id".to_string(), "name".to_string()];
        let mut row = RawRecord::new();
        row.insert("__id".to_string(), json!("rec1"));
        row.insert("name".to_string(), json!(null));
        assert!(!row_has_selected_value(&row, &columns));

        row.insert("name".to_string(), json!("Alice"));
        assert!(row_has_selected_value(&row, &columns));
    }
}
