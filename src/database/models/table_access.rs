use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user grant on a dynamic table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TableAccess {
    pub id: i64,
    pub user_id: i64,
    pub table_name: String,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_export: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grant joined with the owning user's name, for admin listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TableAccessListing {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub table_name: String,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_export: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
