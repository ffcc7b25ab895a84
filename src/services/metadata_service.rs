use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::database::identifier::display_name_for;
use crate::database::models::TableMetadata;

use super::{ServiceError, ServiceResult};

const METADATA_COLUMNS: &str = "id, table_name, display_name, description, is_active, created_at, updated_at";

/// Name of the metadata table itself; never treated as a dataset
pub const METADATA_TABLE: &str = "table_metadata";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataUpdate {
    pub table_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

pub fn default_description(display_name: &str) -> String {
    format!("{} table", display_name)
}

pub struct MetadataService {
    pool: SqlitePool,
}

impl MetadataService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, table_name: &str) -> ServiceResult<Option<TableMetadata>> {
        let metadata = sqlx::query_as::<_, TableMetadata>(&format!(
            "SELECT {} FROM table_metadata WHERE table_name = ?",
            METADATA_COLUMNS
        ))
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(metadata)
    }

    /// All metadata rows, inactive included
    pub async fn list_all(&self) -> ServiceResult<Vec<TableMetadata>> {
        let rows = sqlx::query_as::<_, TableMetadata>(&format!(
            "SELECT {} FROM table_metadata ORDER BY table_name",
            METADATA_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_active(&self) -> ServiceResult<Vec<TableMetadata>> {
        let rows = sqlx::query_as::<_, TableMetadata>(&format!(
            "SELECT {} FROM table_metadata WHERE is_active = 1 ORDER BY table_name",
            METADATA_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Active tables whose first grant for the user allows viewing
    pub async fn list_viewable(&self, user_id: i64) -> ServiceResult<Vec<TableMetadata>> {
        let rows = sqlx::query_as::<_, TableMetadata>(
            "SELECT m.id, m.table_name, m.display_name, m.description, m.is_active, m.created_at, m.updated_at \
             FROM table_metadata m JOIN table_access a ON a.table_name = m.table_name \
             WHERE a.user_id = ? AND a.can_view = 1 AND m.is_active = 1 \
             AND a.id = (SELECT MIN(f.id) FROM table_access f WHERE f.user_id = a.user_id AND f.table_name = a.table_name) \
             ORDER BY m.table_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Existing metadata, or a default row created on the spot
    pub async fn ensure(&self, table_name: &str) -> ServiceResult<TableMetadata> {
        if let Some(existing) = self.find(table_name).await? {
            return Ok(existing);
        }
        let display_name = display_name_for(table_name);
        let description = default_description(&display_name);
        self.upsert(table_name, &display_name, Some(&description)).await
    }

    /// Insert or overwrite display name and description
    pub async fn upsert(
        &self,
        table_name: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> ServiceResult<TableMetadata> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO table_metadata (table_name, display_name, description, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, 1, ?, ?) \
             ON CONFLICT(table_name) DO UPDATE SET display_name = excluded.display_name, \
             description = excluded.description, updated_at = excluded.updated_at",
        )
        .bind(table_name)
        .bind(display_name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!("Registered metadata for {}", table_name);
        self.find(table_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Metadata for '{}' not found", table_name)))
    }

    pub async fn update(&self, table_name: &str, update: &MetadataUpdate) -> ServiceResult<TableMetadata> {
        let mut metadata = self
            .find(table_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Metadata for '{}' not found", table_name)))?;

        if let Some(display_name) = update.display_name.as_ref().filter(|d| !d.trim().is_empty()) {
            metadata.display_name = display_name.clone();
        }
        if let Some(description) = update.description.as_ref() {
            metadata.description = Some(description.clone());
        }
        if let Some(is_active) = update.is_active {
            metadata.is_active = is_active;
        }

        sqlx::query("UPDATE table_metadata SET display_name = ?, description = ?, is_active = ?, updated_at = ? WHERE id = ?")
            .bind(&metadata.display_name)
            .bind(&metadata.description)
            .bind(metadata.is_active)
            .bind(Utc::now())
            .bind(metadata.id)
            .execute(&self.pool)
            .await?;

        self.find(table_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Metadata for '{}' not found", table_name)))
    }

    pub async fn delete(&self, table_name: &str) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM table_metadata WHERE table_name = ?")
            .bind(table_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
