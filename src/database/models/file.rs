use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    /// Display name, editable by the owner
    pub filename: String,
    /// Generated storage name relative to the blob store root
    pub filepath: String,
    pub size: i64,
    pub user_id: i64,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
