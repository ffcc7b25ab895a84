#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use datashare_api::app::{app, AppState};
use datashare_api::config::AppConfig;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Router served in-process on a free port, backed by throwaway databases
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub client: Client,
    _dir: TempDir,
}

fn test_config(dir: &std::path::Path, port: u16) -> AppConfig {
    let mut config = AppConfig::development();
    config.api.host = "127.0.0.1".to_string();
    config.api.port = port;
    config.database.main_url = format!("sqlite://{}", dir.join("main.db").display());
    config.database.datashare_url = format!("sqlite://{}", dir.join("datashare.db").display());
    config.database.max_connections = 4;
    config.storage.upload_folder = dir.join("uploads").display().to_string();
    config.security.jwt_secret = "integration-secret".to_string();
    config
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let state = AppState::initialize(test_config(dir.path(), port)).await?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            client: Client::new(),
            _dir: dir,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("missing access_token")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Create a regular user as admin and return `(id, token)`
    pub async fn member(&self, admin_token: &str, username: &str) -> Result<(i64, String)> {
        let res = self
            .client
            .post(self.url("/api/users"))
            .bearer_auth(admin_token)
            .json(&json!({
                "username": username,
                "password": "password123",
                "email": format!("{}@example.com", username),
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create user failed: {}", res.status());
        let body: Value = res.json().await?;
        let id = body["data"]["id"].as_i64().context("missing user id")?;
        let token = self.login(username, "password123").await?;
        Ok((id, token))
    }

    /// Run DDL/DML directly against the shared-data database
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(self.state.db.datashare_pool()).await?;
        Ok(())
    }
}
