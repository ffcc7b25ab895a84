use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// System database: users, files, table metadata and grants
    pub main_url: String,
    /// Shared-data database holding the dynamic tables
    pub datashare_url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
    pub default_per_page: u32,
    pub max_per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enable_metadata_cache: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.main_url = v;
        }
        if let Ok(v) = env::var("DATASHARE_DATABASE_URL") {
            self.database.datashare_url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("HOST") {
            self.api.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_DEFAULT_PER_PAGE") {
            self.api.default_per_page = v.parse().unwrap_or(self.api.default_per_page);
        }
        if let Ok(v) = env::var("API_MAX_PER_PAGE") {
            self.api.max_per_page = v.parse().unwrap_or(self.api.max_per_page);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET_KEY") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_TOKEN_EXPIRES") {
            self.security.jwt_expiry_secs = v.parse().unwrap_or(self.security.jwt_expiry_secs);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let (Ok(username), Ok(password)) = (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            self.security.bootstrap_admin = Some(BootstrapAdmin {
                username,
                password,
                email: env::var("ADMIN_EMAIL").ok(),
            });
        }

        // Storage overrides
        if let Ok(v) = env::var("UPLOAD_FOLDER") {
            self.storage.upload_folder = v;
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_ENABLE_METADATA") {
            self.cache.enable_metadata_cache = v.parse().unwrap_or(self.cache.enable_metadata_cache);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                main_url: "sqlite://data/main.db".to_string(),
                datashare_url: "sqlite://data/datashare.db".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                max_request_size_bytes: 100 * 1024 * 1024, // 100MB
                default_per_page: 10,
                max_per_page: 1000,
            },
            security: SecurityConfig {
                jwt_secret: "dev-jwt-secret-change-me".to_string(),
                jwt_expiry_secs: 3600,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                bootstrap_admin: Some(BootstrapAdmin {
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                    email: Some("admin@example.com".to_string()),
                }),
            },
            storage: StorageConfig {
                upload_folder: "uploads".to_string(),
            },
            cache: CacheConfig {
                enable_metadata_cache: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                main_url: "sqlite://data/main.db".to_string(),
                datashare_url: "sqlite://data/datashare.db".to_string(),
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                max_request_size_bytes: 50 * 1024 * 1024, // 50MB
                default_per_page: 10,
                max_per_page: 500,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_secs: 3600,
                cors_origins: vec!["https://staging.example.com".to_string()],
                bootstrap_admin: None,
            },
            storage: StorageConfig {
                upload_folder: "uploads".to_string(),
            },
            cache: CacheConfig {
                enable_metadata_cache: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                main_url: "sqlite://data/main.db".to_string(),
                datashare_url: "sqlite://data/datashare.db".to_string(),
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                max_request_size_bytes: 100 * 1024 * 1024, // 100MB
                default_per_page: 10,
                max_per_page: 100,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_secs: 3600,
                cors_origins: vec!["https://app.example.com".to_string()],
                bootstrap_admin: None,
            },
            storage: StorageConfig {
                upload_folder: "/var/lib/datashare/uploads".to_string(),
            },
            cache: CacheConfig {
                enable_metadata_cache: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
