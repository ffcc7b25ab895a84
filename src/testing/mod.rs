use tempfile::TempDir;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::models::User;
use crate::services::NewUser;

pub const TEST_PASSWORD: &str = "password123";

/// Application state over throwaway databases and upload folder.
///
/// Both SQLite files and the blob root live in a temporary directory that is
/// removed when the context drops.
pub struct TestContext {
    pub state: AppState,
    _dir: TempDir,
}

pub fn test_config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::development();
    config.database.main_url = format!("sqlite://{}", dir.join("main.db").display());
    config.database.datashare_url = format!("sqlite://{}", dir.join("datashare.db").display());
    config.database.max_connections = 4;
    config.database.enable_query_logging = false;
    config.storage.upload_folder = dir.join("uploads").display().to_string();
    config.security.jwt_secret = "test-secret".to_string();
    config
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let state = AppState::initialize(test_config(dir.path())).await?;
        Ok(Self { state, _dir: dir })
    }

    /// Run DDL against the shared-data database
    pub async fn create_table(&self, sql: &str) -> anyhow::Result<()> {
        sqlx::query(sql).execute(self.state.db.datashare_pool()).await?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str, role: &str) -> anyhow::Result<User> {
        let input = NewUser {
            username: Some(username.to_string()),
            password: Some(TEST_PASSWORD.to_string()),
            email: Some(format!("{}@example.com", username)),
            role: Some(role.to_string()),
        };
        Ok(self.state.users().create(&input, true).await?)
    }

    /// The bootstrap administrator
    pub async fn admin(&self) -> anyhow::Result<User> {
        let username = self
            .state
            .config
            .security
            .bootstrap_admin
            .as_ref()
            .map(|a| a.username.clone())
            .unwrap_or_else(|| "admin".to_string());
        self.state
            .users()
            .find_by_username(&username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("bootstrap admin missing"))
    }
}
