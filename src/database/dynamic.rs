//! Dynamic repository for tables discovered at runtime in the shared-data database.
//! Rows travel as JSON maps; the column layout always comes from the introspector.

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::identifier::sanitize_table_name;
use crate::database::introspect::SchemaIntrospector;
use crate::database::manager::DatabaseError;
use crate::database::models::{primary_key_columns, ColumnInfo};
use crate::database::pagination::{estimated_filtered_total, Page, PageRequest, Pagination};
use crate::database::query_builder::{
    self, bind_param, create_table_from_columns, insert_statement, CreateStatement, QueryBuilder,
};
use crate::filter::types::SqlResult;
use crate::filter::Filter;

/// Rows and column layout of a whole table, as read for export
pub struct TableDump {
    pub columns: Arc<Vec<ColumnInfo>>,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Clone)]
pub struct DynamicRepository {
    introspector: SchemaIntrospector,
    log_queries: bool,
}

impl DynamicRepository {
    pub fn new(introspector: SchemaIntrospector, log_queries: bool) -> Self {
        Self { introspector, log_queries }
    }

    pub fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    fn pool(&self) -> &SqlitePool {
        self.introspector.pool()
    }

    fn log(&self, sql: &str) {
        if self.log_queries {
            debug!("dynamic sql: {}", sql);
        }
    }

    async fn fetch_rows(&self, sql: &SqlResult) -> Result<Vec<Map<String, Value>>, DatabaseError> {
        self.log(&sql.query);
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(self.pool()).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn execute(&self, sql: &SqlResult) -> Result<sqlx::sqlite::SqliteQueryResult, DatabaseError> {
        self.log(&sql.query);
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        Ok(q.execute(self.pool()).await?)
    }

    /// One page of rows with search, ordering and the two row counts
    pub async fn fetch_page(&self, table: &str, request: &PageRequest) -> Result<Page, DatabaseError> {
        let table = self.introspector.resolve_table(table).await?;
        let columns = self.introspector.get_columns(&table).await?;
        let real_total = self.introspector.real_total(&table).await?;

        let mut filter = Filter::new(&table, &columns)?;
        filter.select(&request.columns)?;
        if let Some(term) = request.search.as_deref() {
            filter.search(term);
        }
        filter.order(request.sort_by.as_deref(), request.sort_order)?;
        filter.limit(request.per_page, Some(request.offset()))?;

        let data = self.fetch_rows(&filter.to_sql()).await?;

        let (filtered_total, exact) = if request.page == 1 {
            let count_sql = filter.to_count_sql();
            self.log(&count_sql.query);
            let mut q = sqlx::query(&count_sql.query);
            for p in count_sql.params.iter() {
                q = bind_param(q, p);
            }
            let row = q.fetch_one(self.pool()).await?;
            let count: i64 = row.try_get("count")?;
            (count, true)
        } else {
            (estimated_filtered_total(request.page, request.per_page, data.len() as i64), false)
        };

        Ok(Page {
            data,
            pagination: Pagination::new(request.page, request.per_page, real_total, filtered_total, exact),
        })
    }

    /// Up to `limit` rows matching `term` in any non-key column; `None` when
    /// the table has no searchable column.
    pub async fn search_rows(
        &self,
        table: &str,
        term: &str,
        limit: i64,
    ) -> Result<Option<(Arc<Vec<ColumnInfo>>, Vec<Map<String, Value>>)>, DatabaseError> {
        let table = sanitize_table_name(table);
        let columns = self.introspector.get_columns(&table).await?;
        if columns.is_empty() {
            return Ok(None);
        }

        let mut filter = Filter::new(&table, &columns)?;
        filter.search(term);
        if !filter.has_search() {
            return Ok(None);
        }
        filter.limit(limit, None)?;

        let rows = self.fetch_rows(&filter.to_sql()).await?;
        Ok(Some((columns, rows)))
    }

    /// Insert one row, returning the generated key
    pub async fn insert_row(&self, table: &str, payload: &Map<String, Value>) -> Result<i64, DatabaseError> {
        let table = self.introspector.resolve_table(table).await?;
        let columns = self.introspector.get_columns(&table).await?;
        let sql = QueryBuilder::new(&table, &columns).insert(payload)?;

        let result = self.execute(&sql).await?;
        self.introspector.cache().invalidate_counts(&table).await;
        Ok(result.last_insert_rowid())
    }

    /// Update the row whose `primary_key` equals `row_id`; returns affected rows
    pub async fn update_row(
        &self,
        table: &str,
        primary_key: &str,
        row_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<u64, DatabaseError> {
        let table = self.introspector.resolve_table(table).await?;
        let columns = self.introspector.get_columns(&table).await?;
        let sql = QueryBuilder::new(&table, &columns).update(primary_key, row_id, payload)?;

        let result = self.execute(&sql).await?;
        Ok(result.rows_affected())
    }

    /// Delete the row whose `primary_key` equals `row_id`; returns affected rows
    pub async fn delete_row(&self, table: &str, primary_key: &str, row_id: &str) -> Result<u64, DatabaseError> {
        let table = self.introspector.resolve_table(table).await?;
        let columns = self.introspector.get_columns(&table).await?;
        let sql = QueryBuilder::new(&table, &columns).delete(primary_key, row_id)?;

        let result = self.execute(&sql).await?;
        self.introspector.cache().invalidate_counts(&table).await;
        Ok(result.rows_affected())
    }

    /// Full, unfiltered table contents ordered by primary key
    pub async fn fetch_all(&self, table: &str) -> Result<TableDump, DatabaseError> {
        let table = self.introspector.resolve_table(table).await?;
        let columns = self.introspector.get_columns(&table).await?;
        let rows = self.fetch_rows(&QueryBuilder::new(&table, &columns).select_all()).await?;
        Ok(TableDump { columns, rows })
    }

    /// Run a caller-supplied CREATE TABLE, injecting a surrogate key if it has none
    pub async fn create_table_from_sql(&self, statement: &str) -> Result<CreateStatement, DatabaseError> {
        let create = query_builder::create_table_from_sql(statement)?;
        self.log(&create.sql);
        sqlx::query(&create.sql).execute(self.pool()).await?;
        self.introspector.cache().invalidate(&create.table_name).await;

        info!(
            "Created table {} from SQL (surrogate key injected: {})",
            create.table_name, create.injected_key
        );
        Ok(create)
    }

    /// Create a table for imported data and load every row in one transaction.
    ///
    /// The CREATE is committed first; if loading fails the inserts roll back
    /// but the empty table stays.
    pub async fn create_and_load(
        &self,
        table: &str,
        column_names: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<usize, DatabaseError> {
        if self.introspector.table_exists(table).await? {
            return Err(DatabaseError::InvalidRequest(format!("Table '{}' already exists", table)));
        }

        let create = create_table_from_columns(table, column_names)?;
        self.log(&create);
        sqlx::query(&create).execute(self.pool()).await?;
        self.introspector.cache().invalidate(table).await;

        let insert = insert_statement(table, column_names);
        self.log(&insert);

        let mut tx = self.pool().begin().await?;
        for (index, row) in rows.iter().enumerate() {
            let mut q = sqlx::query(&insert);
            for i in 0..column_names.len() {
                // Short rows are padded with NULL
                q = q.bind(row.get(i).cloned().flatten());
            }
            if let Err(e) = q.execute(&mut *tx).await {
                warn!("Import into {} failed at data row {}: {}", table, index + 1, e);
                tx.rollback().await?;
                return Err(DatabaseError::QueryError(format!(
                    "Failed to insert row {} into '{}': {}",
                    index + 1,
                    table,
                    e
                )));
            }
        }
        tx.commit().await?;

        self.introspector.cache().invalidate_counts(table).await;
        info!("Imported {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    /// DROP TABLE IF EXISTS plus cache invalidation
    pub async fn drop_table(&self, table: &str) -> Result<String, DatabaseError> {
        let table = sanitize_table_name(table);
        if table.is_empty() {
            return Err(DatabaseError::InvalidIdentifier(table));
        }
        let sql = query_builder::drop_table(&table);
        self.log(&sql);
        sqlx::query(&sql).execute(self.pool()).await?;
        self.introspector.cache().invalidate(&table).await;
        info!("Dropped table {}", table);
        Ok(table)
    }
}

/// Value of the first primary-key column, if the table has one
pub fn row_key(columns: &[ColumnInfo], row: &Map<String, Value>) -> Value {
    primary_key_columns(columns)
        .first()
        .and_then(|k| row.get(*k).cloned())
        .unwrap_or(Value::Null)
}

/// Convert a row into a JSON map keyed by column name
pub fn row_to_map(row: &SqliteRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, i));
    }
    map
}

/// Decode by the value's runtime storage class, then fall back through the common types
fn column_value(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).ok().map(Value::from),
        "REAL" => row
            .try_get::<f64, _>(index)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .ok()
            .map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len()))),
        _ => row.try_get::<String, _>(index).ok().map(Value::String),
    };
    if let Some(value) = decoded {
        return value;
    }

    if let Ok(s) = row.try_get::<String, _>(index) {
        Value::String(s)
    } else if let Ok(i) = row.try_get::<i64, _>(index) {
        Value::from(i)
    } else if let Ok(f) = row.try_get::<f64, _>(index) {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    } else {
        Value::Null
    }
}
