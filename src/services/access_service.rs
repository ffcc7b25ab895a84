use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::{AccessGate, Capability};
use crate::database::identifier::sanitize_table_name;
use crate::database::introspect::SchemaIntrospector;
use crate::database::models::{TableAccess, TableAccessListing, User};

use super::{ServiceError, ServiceResult};

const ACCESS_COLUMNS: &str = "id, user_id, table_name, can_view, can_edit, can_export, created_at, updated_at";

/// Body of `POST /admin/access`: either one `(user_id, table_name)` pair or
/// the cross-product of `user_ids` and `table_names`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantRequest {
    pub user_id: Option<i64>,
    pub table_name: Option<String>,
    pub user_ids: Option<Vec<i64>>,
    pub table_names: Option<Vec<String>>,
    pub can_view: Option<bool>,
    pub can_edit: Option<bool>,
    pub can_export: Option<bool>,
}

impl GrantRequest {
    pub fn is_batch(&self) -> bool {
        self.user_ids.is_some() || self.table_names.is_some()
    }

    fn flags(&self) -> (bool, bool, bool) {
        (
            self.can_view.unwrap_or(true),
            self.can_edit.unwrap_or(false),
            self.can_export.unwrap_or(true),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchGrantResult {
    pub success_count: usize,
    pub skipped: Vec<String>,
}

pub struct AccessService {
    pool: SqlitePool,
    introspector: SchemaIntrospector,
}

impl AccessService {
    pub fn new(pool: SqlitePool, introspector: SchemaIntrospector) -> Self {
        Self { pool, introspector }
    }

    /// The authoritative grant: the oldest row for the pair
    pub async fn first_grant(&self, user_id: i64, table_name: &str) -> ServiceResult<Option<TableAccess>> {
        let grant = sqlx::query_as::<_, TableAccess>(&format!(
            "SELECT {} FROM table_access WHERE user_id = ? AND table_name = ? ORDER BY id LIMIT 1",
            ACCESS_COLUMNS
        ))
        .bind(user_id)
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(grant)
    }

    pub async fn authorize(&self, user: &User, table_name: &str, capability: Capability) -> ServiceResult<bool> {
        if AccessGate::is_admin(user) {
            return Ok(AccessGate::authorize(user, None, capability));
        }
        let table_name = sanitize_table_name(table_name);
        let grant = self.first_grant(user.id, &table_name).await?;
        Ok(AccessGate::authorize(user, grant.as_ref(), capability))
    }

    /// `authorize`, turned into a 403 on denial
    pub async fn require(&self, user: &User, table_name: &str, capability: Capability) -> ServiceResult<()> {
        if self.authorize(user, table_name, capability).await? {
            Ok(())
        } else {
            warn!("Denied {} on {} for user {}", capability.as_str(), table_name, user.id);
            Err(ServiceError::Forbidden(format!(
                "You do not have {} permission for table '{}'",
                capability.as_str(),
                sanitize_table_name(table_name)
            )))
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<TableAccessListing>> {
        let rows = sqlx::query_as::<_, TableAccessListing>(
            "SELECT a.id, a.user_id, u.username, a.table_name, a.can_view, a.can_edit, a.can_export, a.created_at, a.updated_at \
             FROM table_access a JOIN users u ON u.id = a.user_id ORDER BY a.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_user(&self, user_id: i64) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, email, role, status, session_nonce, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Update the pair's first grant in place, or insert one
    async fn upsert(&self, user_id: i64, table_name: &str, flags: (bool, bool, bool)) -> ServiceResult<TableAccess> {
        let (can_view, can_edit, can_export) = flags;
        let now = Utc::now();

        let id = match self.first_grant(user_id, table_name).await? {
            Some(existing) => {
                sqlx::query("UPDATE table_access SET can_view = ?, can_edit = ?, can_export = ?, updated_at = ? WHERE id = ?")
                    .bind(can_view)
                    .bind(can_edit)
                    .bind(can_export)
                    .bind(now)
                    .bind(existing.id)
                    .execute(&self.pool)
                    .await?;
                existing.id
            }
            None => sqlx::query(
                "INSERT INTO table_access (user_id, table_name, can_view, can_edit, can_export, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(table_name)
            .bind(can_view)
            .bind(can_edit)
            .bind(can_export)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid(),
        };

        let grant = sqlx::query_as::<_, TableAccess>(&format!("SELECT {} FROM table_access WHERE id = ?", ACCESS_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(grant)
    }

    pub async fn grant(&self, request: &GrantRequest) -> ServiceResult<TableAccess> {
        let (user_id, table_name) = match (request.user_id, request.table_name.as_deref()) {
            (Some(user_id), Some(table)) if !table.trim().is_empty() => (user_id, sanitize_table_name(table)),
            _ => return Err(ServiceError::BadRequest("user_id and table_name are required".to_string())),
        };

        let user = self
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        if user.is_admin() {
            return Err(ServiceError::BadRequest(
                "Administrators already have access to every table".to_string(),
            ));
        }
        if !self.introspector.table_exists(&table_name).await? {
            return Err(ServiceError::NotFound(format!("Table '{}' not found", table_name)));
        }

        let grant = self.upsert(user_id, &table_name, request.flags()).await?;
        info!("Granted {:?} on {} to user {}", request.flags(), table_name, user_id);
        Ok(grant)
    }

    /// Cross-product grant. Admin targets, unknown users, missing tables and
    /// per-pair failures are skipped; the rest still apply.
    pub async fn grant_batch(&self, request: &GrantRequest) -> ServiceResult<BatchGrantResult> {
        let user_ids = request.user_ids.clone().unwrap_or_default();
        let table_names = request.table_names.clone().unwrap_or_default();
        if user_ids.is_empty() || table_names.is_empty() {
            return Err(ServiceError::BadRequest("user_ids and table_names are required".to_string()));
        }

        let mut result = BatchGrantResult { success_count: 0, skipped: vec![] };
        let mut tables = Vec::with_capacity(table_names.len());
        for raw in &table_names {
            let table = sanitize_table_name(raw);
            if self.introspector.table_exists(&table).await? {
                tables.push(table);
            } else {
                result.skipped.push(format!("table '{}' does not exist", table));
            }
        }

        for user_id in user_ids {
            match self.find_user(user_id).await? {
                None => {
                    result.skipped.push(format!("user {} not found", user_id));
                    continue;
                }
                Some(user) if user.is_admin() => {
                    result.skipped.push(format!("user {} is an administrator", user_id));
                    continue;
                }
                Some(_) => {}
            }
            for table in &tables {
                match self.upsert(user_id, table, request.flags()).await {
                    Ok(_) => result.success_count += 1,
                    Err(e) => {
                        warn!("Batch grant {} -> {} failed: {}", user_id, table, e);
                        result.skipped.push(format!("user {} on '{}': {}", user_id, table, e));
                    }
                }
            }
        }

        info!("Batch grant applied {} pairs", result.success_count);
        Ok(result)
    }

    pub async fn revoke(&self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM table_access WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("Access grant {} not found", id)));
        }
        Ok(())
    }

    pub async fn delete_for_table(&self, table_name: &str) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM table_access WHERE table_name = ?")
            .bind(table_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Tables whose first grant for the user carries `capability`
    pub async fn granted_tables(&self, user: &User, capability: Capability) -> ServiceResult<Vec<String>> {
        let column = match capability {
            Capability::View => "can_view",
            Capability::Edit => "can_edit",
            Capability::Export => "can_export",
        };
        let tables: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT a.table_name FROM table_access a WHERE a.user_id = ? AND a.{} = 1 \
             AND a.id = (SELECT MIN(f.id) FROM table_access f WHERE f.user_id = a.user_id AND f.table_name = a.table_name) \
             ORDER BY a.table_name",
            column
        ))
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }
}
