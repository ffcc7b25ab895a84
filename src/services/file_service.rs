use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::models::{FileRecord, User};
use crate::storage::{generate_storage_key, BlobStore};

use super::{ServiceError, ServiceResult};

const FILE_COLUMNS: &str = "id, filename, filepath, size, user_id, is_shared, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileListQuery {
    pub shared: Option<bool>,
    pub all: Option<bool>,
}

pub struct FileService {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

fn can_manage(user: &User, file: &FileRecord) -> bool {
    user.is_admin() || file.user_id == user.id
}

impl FileService {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    async fn find(&self, id: i64) -> ServiceResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("File {} not found", id)))
    }

    async fn find_managed(&self, user: &User, id: i64) -> ServiceResult<FileRecord> {
        let file = self.find(id).await?;
        if !can_manage(user, &file) {
            return Err(ServiceError::Forbidden("You do not own this file".to_string()));
        }
        Ok(file)
    }

    async fn insert(&self, filename: &str, key: &str, size: i64, user_id: i64) -> ServiceResult<FileRecord> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO files (filename, filepath, size, user_id, is_shared, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(filename)
        .bind(key)
        .bind(size)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        self.find(id).await
    }

    /// Store bytes under a generated name, then record them for `user`
    pub async fn upload(&self, user: &User, filename: &str, bytes: &[u8]) -> ServiceResult<FileRecord> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ServiceError::BadRequest("No file selected".to_string()));
        }

        let key = generate_storage_key(filename);
        self.blobs.put(&key, bytes).await?;

        match self.insert(filename, &key, bytes.len() as i64, user.id).await {
            Ok(record) => {
                info!("User {} uploaded {} as {}", user.id, filename, key);
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&key).await {
                    warn!("Failed to remove orphaned blob {}: {}", key, cleanup);
                }
                Err(e)
            }
        }
    }

    pub async fn list(&self, user: &User, query: &FileListQuery) -> ServiceResult<Vec<FileRecord>> {
        let base = format!("SELECT {} FROM files", FILE_COLUMNS);
        let files = if query.all.unwrap_or(false) && user.is_admin() {
            sqlx::query_as::<_, FileRecord>(&format!("{} ORDER BY created_at DESC, id DESC", base))
                .fetch_all(&self.pool)
                .await?
        } else if query.shared.unwrap_or(false) {
            sqlx::query_as::<_, FileRecord>(&format!("{} WHERE is_shared = 1 ORDER BY created_at DESC, id DESC", base))
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, FileRecord>(&format!("{} WHERE user_id = ? ORDER BY created_at DESC, id DESC", base))
                .bind(user.id)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(files)
    }

    /// Owner, admin, or anyone when the file is shared
    pub async fn download(&self, user: &User, id: i64) -> ServiceResult<(FileRecord, Vec<u8>)> {
        let file = self.find(id).await?;
        if !file.is_shared && !can_manage(user, &file) {
            return Err(ServiceError::Forbidden("You do not have access to this file".to_string()));
        }
        let bytes = self.blobs.get(&file.filepath).await?;
        Ok((file, bytes))
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        let file = self.find_managed(user, id).await?;
        self.blobs.delete(&file.filepath).await?;
        sqlx::query("DELETE FROM files WHERE id = ?").bind(id).execute(&self.pool).await?;
        info!("Deleted file {} ({})", id, file.filepath);
        Ok(())
    }

    /// Duplicate a shared file, bytes included, as a private file of `user`
    pub async fn copy(&self, user: &User, id: i64) -> ServiceResult<FileRecord> {
        let file = self.find(id).await?;
        if !file.is_shared {
            return Err(ServiceError::Forbidden("Only shared files can be copied".to_string()));
        }

        let key = generate_storage_key(&file.filename);
        self.blobs.copy(&file.filepath, &key).await?;
        match self.insert(&file.filename, &key, file.size, user.id).await {
            Ok(record) => Ok(record),
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&key).await {
                    warn!("Failed to remove orphaned blob {}: {}", key, cleanup);
                }
                Err(e)
            }
        }
    }

    pub async fn toggle_share(&self, user: &User, id: i64) -> ServiceResult<FileRecord> {
        let file = self.find_managed(user, id).await?;
        sqlx::query("UPDATE files SET is_shared = ?, updated_at = ? WHERE id = ?")
            .bind(!file.is_shared)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.find(id).await
    }

    pub async fn rename(&self, user: &User, id: i64, new_name: &str) -> ServiceResult<FileRecord> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ServiceError::BadRequest("New filename cannot be empty".to_string()));
        }
        self.find_managed(user, id).await?;
        sqlx::query("UPDATE files SET filename = ?, updated_at = ? WHERE id = ?")
            .bind(new_name)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.find(id).await
    }

    /// Remove stored bytes for every file of a user about to be deleted
    pub async fn purge_user(&self, user_id: i64) -> ServiceResult<usize> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT filepath FROM files WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        for key in &keys {
            self.blobs.delete(key).await?;
        }
        Ok(keys.len())
    }
}
