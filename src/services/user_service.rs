use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::{hash_password, new_session_nonce, verify_password};
use crate::config::BootstrapAdmin;
use crate::database::models::{User, ROLE_ADMIN, ROLE_USER};

use super::{ServiceError, ServiceResult};

const USER_COLUMNS: &str =
    "id, username, password_hash, email, role, status, session_nonce, created_at, updated_at";

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn validate_role(role: &str) -> ServiceResult<()> {
    if role == ROLE_ADMIN || role == ROLE_USER {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("Invalid role: {}", role)))
    }
}

pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn find(&self, id: i64) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn ensure_unique(&self, username: Option<&str>, email: Option<&str>, except: Option<i64>) -> ServiceResult<()> {
        let except = except.unwrap_or(-1);
        if let Some(username) = username {
            let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(except)
                .fetch_one(&self.pool)
                .await?;
            if taken > 0 {
                return Err(ServiceError::BadRequest("Username already exists".to_string()));
            }
        }
        if let Some(email) = email {
            let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(except)
                .fetch_one(&self.pool)
                .await?;
            if taken > 0 {
                return Err(ServiceError::BadRequest("Email already exists".to_string()));
            }
        }
        Ok(())
    }

    /// Create an account. `allow_role` is false for self-registration, which
    /// always yields a regular user.
    pub async fn create(&self, input: &NewUser, allow_role: bool) -> ServiceResult<User> {
        let username = non_empty(input.username.as_ref())
            .ok_or_else(|| ServiceError::BadRequest("Username is required".to_string()))?;
        let password = input
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("Password is required".to_string()))?;
        let email = non_empty(input.email.as_ref());

        let role = match (allow_role, input.role.as_deref()) {
            (true, Some(role)) => {
                validate_role(role)?;
                role
            }
            _ => ROLE_USER,
        };

        self.ensure_unique(Some(username), email, None).await?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, email, role, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(hash_password(password))
        .bind(email)
        .bind(role)
        .bind(STATUS_OFFLINE)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!("Created user {} ({}) with role {}", username, id, role);
        self.get(id).await
    }

    /// Check credentials; unknown user and wrong password are indistinguishable
    pub async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User> {
        let invalid = || ServiceError::Unauthorized("Invalid username or password".to_string());
        let user = self.find_by_username(username).await?.ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            warn!("Failed login for {}", username);
            return Err(invalid());
        }
        Ok(user)
    }

    /// Mark the user online and replace their session nonce, which
    /// invalidates every token issued before.
    pub async fn start_session(&self, user_id: i64) -> ServiceResult<String> {
        let nonce = new_session_nonce();
        sqlx::query("UPDATE users SET status = ?, session_nonce = ?, updated_at = ? WHERE id = ?")
            .bind(STATUS_ONLINE)
            .bind(&nonce)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(nonce)
    }

    pub async fn end_session(&self, user_id: i64) -> ServiceResult<()> {
        sqlx::query("UPDATE users SET status = ?, session_nonce = NULL, updated_at = ? WHERE id = ?")
            .bind(STATUS_OFFLINE)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Admins may edit anyone; users only themselves and never their role
    pub async fn update(&self, id: i64, input: &UserUpdate, actor: &User) -> ServiceResult<User> {
        if !actor.is_admin() && actor.id != id {
            return Err(ServiceError::Forbidden("You can only modify your own account".to_string()));
        }
        let mut user = self.get(id).await?;

        if let Some(role) = input.role.as_deref() {
            if role != user.role {
                if !actor.is_admin() {
                    return Err(ServiceError::Forbidden("Only administrators can change roles".to_string()));
                }
                validate_role(role)?;
                user.role = role.to_string();
            }
        }

        let username = non_empty(input.username.as_ref());
        let email = non_empty(input.email.as_ref());
        self.ensure_unique(username, email, Some(id)).await?;

        if let Some(username) = username {
            user.username = username.to_string();
        }
        if let Some(email) = email {
            user.email = Some(email.to_string());
        }
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            user.password_hash = hash_password(password);
        }

        sqlx::query("UPDATE users SET username = ?, email = ?, password_hash = ?, role = ?, updated_at = ? WHERE id = ?")
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get(id).await
    }

    /// Grants and file rows cascade with the user
    pub async fn delete(&self, id: i64, actor: &User) -> ServiceResult<()> {
        if actor.id == id {
            return Err(ServiceError::BadRequest("Cannot delete your own account".to_string()));
        }
        let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", id)));
        }
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Create the configured admin account unless an admin already exists
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> ServiceResult<Option<User>> {
        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(ROLE_ADMIN)
            .fetch_one(&self.pool)
            .await?;
        if admins > 0 {
            return Ok(None);
        }

        let input = NewUser {
            username: Some(admin.username.clone()),
            password: Some(admin.password.clone()),
            email: admin.email.clone(),
            role: Some(ROLE_ADMIN.to_string()),
        };
        let user = self.create(&input, true).await?;
        info!("Bootstrapped admin account {}", user.username);
        Ok(Some(user))
    }
}
