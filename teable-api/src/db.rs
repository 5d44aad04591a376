//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! Postgres-backed [`TableStore`] used by the intelligence pipeline.
//!
//! Field and table metadata are read from the `field` and `table_meta`
//! tables. User rows live in the physical table named by
//! `table_meta.db_table_name`, one column per field.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use std::time::Duration;
use teable_core::{
    Field, FieldOptions, RawRecord, RecordId, StorageError, TableId, TableMeta, TeableResult,
    AUTO_NUMBER_COLUMN, RECORD_ID_COLUMN, SYSTEM_DB_FIELD_NAMES,
};
use teable_storage::{PageRequest, RecordUpdate, TableStore};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout when the pool is exhausted
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "teable".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Reads `TEABLE_DB_HOST`, `TEABLE_DB_PORT`, `TEABLE_DB_NAME`,
    /// `TEABLE_DB_USER`, `TEABLE_DB_PASSWORD`, `TEABLE_DB_POOL_SIZE` and
    /// `TEABLE_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TEABLE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("TEABLE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("TEABLE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("TEABLE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("TEABLE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("TEABLE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("TEABLE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// IDENTIFIER QUOTING
// ============================================================================

/// Quote one SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name (`schema.table`).
pub fn quote_table_name(db_table_name: &str) -> String {
    db_table_name
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Build the page query for a physical table.
///
/// Rows where every selected non-system column is null are filtered out.
/// Rows come back as one JSON object each, keyed by column name.
fn page_query(db_table_name: &str, columns: &[String]) -> String {
    let select = if columns.is_empty() {
        quote_identifier(RECORD_ID_COLUMN)
    } else {
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let value_columns: Vec<String> = columns
        .iter()
        .filter(|c| !SYSTEM_DB_FIELD_NAMES.contains(&c.as_str()))
        .map(|c| format!("{} IS NOT NULL", quote_identifier(c)))
        .collect();
    let filter = if value_columns.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", value_columns.join(" OR "))
    };

    format!(
        "SELECT to_jsonb(t) FROM (SELECT {select} FROM {table}{filter} ORDER BY {order} LIMIT $1 OFFSET $2) t",
        table = quote_table_name(db_table_name),
        order = quote_identifier(AUTO_NUMBER_COLUMN),
    )
}

fn query_failed(err: impl std::fmt::Display) -> StorageError {
    StorageError::QueryFailed {
        reason: err.to_string(),
    }
}

/// Text written to a cell; generated values are text, anything else is
/// stored in its JSON form.
fn cell_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// POSTGRES TABLE STORE
// ============================================================================

/// [`TableStore`] over a Teable Postgres database.
#[derive(Clone)]
pub struct PgTableStore {
    pool: Pool,
}

impl PgTableStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> TeableResult<deadpool_postgres::Object> {
        Ok(self.pool.get().await.map_err(query_failed)?)
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn fields(&self, table_id: &TableId) -> TeableResult<Vec<Field>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT id, name, db_field_name, options FROM field \
                 WHERE table_id = $1 AND deleted_time IS NULL ORDER BY \"order\"",
                &[&table_id.as_str()],
            )
            .await
            .map_err(query_failed)?;

        let fields = rows
            .iter()
            .map(|row| {
                let id: String = row.get(0);
                let options: Option<String> = row.get(3);
                let options = options
                    .map(|raw| {
                        serde_json::from_str::<FieldOptions>(&raw).unwrap_or_else(|e| {
                            tracing::warn!(field_id = %id, error = %e, "Unreadable field options, ignoring");
                            FieldOptions::default()
                        })
                    })
                    .unwrap_or_default();
                Field {
                    id: id.into(),
                    name: row.get(1),
                    db_field_name: row.get(2),
                    options,
                }
            })
            .collect();
        Ok(fields)
    }

    async fn table_meta(&self, table_id: &TableId) -> TeableResult<TableMeta> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT base_id, db_table_name FROM table_meta \
                 WHERE id = $1 AND deleted_time IS NULL",
                &[&table_id.as_str()],
            )
            .await
            .map_err(query_failed)?
            .ok_or_else(|| StorageError::TableNotFound {
                table_id: table_id.clone(),
            })?;

        let base_id: String = row.get(0);
        Ok(TableMeta {
            base_id: base_id.into(),
            db_table_name: row.get(1),
        })
    }

    async fn row_count(&self, db_table_name: &str) -> TeableResult<usize> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_table_name(db_table_name));
        let row = conn.query_one(&sql, &[]).await.map_err(query_failed)?;
        let count: i64 = row.get(0);
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn records_page(
        &self,
        db_table_name: &str,
        request: PageRequest<'_>,
    ) -> TeableResult<Vec<RawRecord>> {
        let conn = self.get_conn().await?;
        let sql = page_query(db_table_name, request.columns);
        let limit = i64::try_from(request.page_size).map_err(query_failed)?;
        let offset = i64::try_from(request.offset()).map_err(query_failed)?;

        let rows = conn
            .query(&sql, &[&limit, &offset])
            .await
            .map_err(query_failed)?;

        Ok(rows
            .iter()
            .filter_map(|row| match row.get::<_, JsonValue>(0) {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    async fn update_record(
        &self,
        table_id: &TableId,
        record_id: &RecordId,
        update: RecordUpdate,
    ) -> TeableResult<()> {
        if update.fields.is_empty() {
            return Ok(());
        }

        let fields = self.fields(table_id).await?;
        let meta = self.table_meta(table_id).await?;

        let mut assignments = Vec::with_capacity(update.fields.len());
        let mut values: Vec<Option<String>> = Vec::with_capacity(update.fields.len());
        for (name, value) in &update.fields {
            let field = fields
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| StorageError::FieldNotFound { name: name.clone() })?;
            values.push(cell_text(value));
            assignments.push(format!(
                "{} = ${}",
                quote_identifier(&field.db_field_name),
                values.len()
            ));
        }

        let sql = format!(
            "UPDATE {table} SET {set}, \"__version\" = \"__version\" + 1, \
             \"__last_modified_time\" = now() WHERE {id} = ${n}",
            table = quote_table_name(&meta.db_table_name),
            set = assignments.join(", "),
            id = quote_identifier(RECORD_ID_COLUMN),
            n = values.len() + 1,
        );

        let record_key = record_id.as_str();
        let mut params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        params.push(&record_key);

        let conn = self.get_conn().await?;
        let updated = conn
            .execute(&sql, &params)
            .await
            .map_err(|e| StorageError::UpdateFailed {
                record_id: record_id.clone(),
                reason: e.to_string(),
            })?;

        if updated == 0 {
            return Err(StorageError::RecordNotFound {
                table_id: table_id.clone(),
                record_id: record_id.clone(),
            }
            .into());
        }
        tracing::debug!(table_id = %table_id, record_id = %record_id, "Record updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "teable");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_schema_qualified_table() {
        assert_eq!(quote_table_name("bseA.tblPeople"), "\"bseA\".\"tblPeople\"");
        assert_eq!(quote_table_name("people"), "\"people\"");
    }

    #[test]
    fn test_page_query_filters_on_value_columns_only() {
        let columns = vec!["__id".to_string(), "name".to_string(), "bio".to_string()];
        let sql = page_query("bseA.people", &columns);

        assert!(sql.contains("SELECT \"__id\", \"name\", \"bio\" FROM \"bseA\".\"people\""));
        assert!(sql.contains("WHERE \"name\" IS NOT NULL OR \"bio\" IS NOT NULL"));
        assert!(sql.contains("ORDER BY \"__auto_number\" LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_page_query_without_value_columns() {
        let columns = vec!["__id".to_string()];
        let sql = page_query("people", &columns);
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!(null)), None);
        assert_eq!(cell_text(&json!("思考中...")), Some("思考中...".to_string()));
        assert_eq!(cell_text(&json!(3)), Some("3".to_string()));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Quoted identifiers never contain a lone double quote.
        #[test]
        fn prop_quote_identifier_is_reversible(name in "[a-zA-Z0-9_\" ]{0,20}") {
            let quoted = quote_identifier(&name);
            prop_assert!(quoted.starts_with('"') && quoted.ends_with('"'));
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("\"\"", "\""), name);
        }
    }
}
