use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the dynamic table layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unknown column '{column}' for table '{table}'")]
    InvalidColumn { table: String, column: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] crate::filter::FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Which logical database a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalDatabase {
    /// users, files, table_metadata, table_access
    Main,
    /// Dynamic tables shared with users
    Datashare,
}

/// Connection pools for the system database and the shared-data database.
///
/// Connections are acquired per statement (or per transaction) from the pool and
/// returned when the borrow ends, on success and error paths alike.
#[derive(Clone)]
pub struct DatabaseManager {
    main: SqlitePool,
    datashare: SqlitePool,
}

const SYSTEM_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username VARCHAR(80) NOT NULL UNIQUE,
        password_hash VARCHAR(200) NOT NULL,
        email VARCHAR(120) UNIQUE,
        role VARCHAR(20) NOT NULL DEFAULT 'user',
        status VARCHAR(20) NOT NULL DEFAULT 'offline',
        session_nonce VARCHAR(64),
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename VARCHAR(255) NOT NULL,
        filepath VARCHAR(255) NOT NULL,
        size INTEGER NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        is_shared BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS table_metadata (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name VARCHAR(100) NOT NULL UNIQUE,
        display_name VARCHAR(100) NOT NULL,
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS table_access (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        table_name VARCHAR(100) NOT NULL,
        can_view BOOLEAN NOT NULL DEFAULT 1,
        can_edit BOOLEAN NOT NULL DEFAULT 0,
        can_export BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_table_access_user_table ON table_access(user_id, table_name)",
];

impl DatabaseManager {
    /// Open both pools and make sure the system tables exist
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.main_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        if config.datashare_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATASHARE_DATABASE_URL"));
        }

        let main = Self::open_pool(&config.main_url, config).await?;
        let datashare = Self::open_pool(&config.datashare_url, config).await?;

        let manager = Self { main, datashare };
        manager.bootstrap_system_schema().await?;
        Ok(manager)
    }

    async fn open_pool(url: &str, config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl(url.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await?;

        info!("Created database pool for: {}", url);
        Ok(pool)
    }

    async fn bootstrap_system_schema(&self) -> Result<(), DatabaseError> {
        for statement in SYSTEM_SCHEMA {
            sqlx::query(statement).execute(&self.main).await?;
        }
        Ok(())
    }

    pub fn pool(&self, database: LogicalDatabase) -> &SqlitePool {
        match database {
            LogicalDatabase::Main => &self.main,
            LogicalDatabase::Datashare => &self.datashare,
        }
    }

    /// Main system database pool
    pub fn main_pool(&self) -> &SqlitePool {
        self.pool(LogicalDatabase::Main)
    }

    /// Shared-data database pool
    pub fn datashare_pool(&self) -> &SqlitePool {
        self.pool(LogicalDatabase::Datashare)
    }

    /// Pings both pools to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.main).await?;
        sqlx::query("SELECT 1").execute(&self.datashare).await?;
        Ok(())
    }

    /// Close both pools (e.g., on shutdown)
    pub async fn close(&self) {
        self.main.close().await;
        self.datashare.close().await;
        info!("Closed database pools");
    }
}
