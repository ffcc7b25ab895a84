use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use crate::database::cache::MetadataCache;
use crate::database::identifier::{quote_identifier, sanitize_table_name};
use crate::database::manager::DatabaseError;
use crate::database::models::{ColumnInfo, PRIMARY_KEY_ROLE};

/// Discovers tables and their column layout in the shared-data database.
///
/// Every entry point sanitizes the table name first, so `db.orders`,
/// `"orders"` and `orders` all resolve to the same table and cache entry.
#[derive(Clone)]
pub struct SchemaIntrospector {
    pool: SqlitePool,
    cache: MetadataCache,
}

impl SchemaIntrospector {
    pub fn new(pool: SqlitePool, cache: MetadataCache) -> Self {
        Self { pool, cache }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// All user tables, sorted by name
    pub async fn list_all_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Exact membership of the sanitized name in the live table list
    pub async fn table_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let name = sanitize_table_name(name);
        if name.is_empty() {
            return Ok(false);
        }
        let tables = self.list_all_tables().await?;
        Ok(tables.iter().any(|t| *t == name))
    }

    /// Sanitize and confirm existence, returning the bare name
    pub async fn resolve_table(&self, name: &str) -> Result<String, DatabaseError> {
        let bare = sanitize_table_name(name);
        if self.table_exists(&bare).await? {
            Ok(bare)
        } else {
            Err(DatabaseError::TableNotFound(bare))
        }
    }

    /// Ordered column descriptions for a table, served from cache when present
    pub async fn get_columns(&self, name: &str) -> Result<Arc<Vec<ColumnInfo>>, DatabaseError> {
        let name = sanitize_table_name(name);
        if let Some(columns) = self.cache.columns(&name).await {
            return Ok(columns);
        }

        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(&name)))
            .fetch_all(&self.pool)
            .await?;

        // PRAGMA table_info returns: cid, name, type, notnull, dflt_value, pk
        let pk_count = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").map(|pk| pk > 0).unwrap_or(false))
            .count();

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let column_name: String = row.try_get("name")?;
            let data_type: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let default: Option<String> = row.try_get::<Option<String>, _>("dflt_value").ok().flatten();
            let pk: i64 = row.try_get("pk")?;

            let is_pk = pk > 0;
            // A lone INTEGER primary key aliases the rowid and auto-increments
            let extra = if is_pk && pk_count == 1 && data_type.eq_ignore_ascii_case("INTEGER") {
                "auto_increment".to_string()
            } else {
                String::new()
            };

            columns.push(ColumnInfo {
                name: column_name,
                data_type,
                nullable: not_null == 0 && !is_pk,
                key: if is_pk { PRIMARY_KEY_ROLE.to_string() } else { String::new() },
                default,
                extra,
            });
        }

        debug!("Introspected {} columns for {}", columns.len(), name);
        Ok(self.cache.store_columns(&name, columns).await)
    }

    /// Unfiltered row count, cached until a write invalidates it
    pub async fn real_total(&self, name: &str) -> Result<i64, DatabaseError> {
        let name = sanitize_table_name(name);
        if let Some(total) = self.cache.real_total(&name).await {
            return Ok(total);
        }

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_identifier(&name)))
            .fetch_one(&self.pool)
            .await?;
        self.cache.store_real_total(&name, total).await;
        Ok(total)
    }
}
