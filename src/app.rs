use axum::{extract::DefaultBodyLimit, http::HeaderValue, middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::AppConfig;
use crate::database::{DatabaseManager, DynamicRepository, MetadataCache, SchemaIntrospector};
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, require_admin_middleware, validate_user_middleware};
use crate::services::{AccessService, FileService, MetadataService, SearchService, TableService, UserService};
use crate::storage::{BlobStore, LocalBlobStore};

/// Shared handles for every request. Cloning is cheap; services are built
/// per call on top of these.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub cache: MetadataCache,
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Open both databases and the upload folder, then bootstrap the admin account
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Self> {
        let db = DatabaseManager::connect(&config.database).await?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.storage.upload_folder).await?);
        let cache = MetadataCache::new(config.cache.enable_metadata_cache);

        let state = Self {
            db,
            cache,
            config: Arc::new(config),
            blobs,
        };

        if let Some(admin) = state.config.security.bootstrap_admin.as_ref() {
            if let Some(user) = state.users().ensure_admin(admin).await? {
                info!("Default admin '{}' created", user.username);
            }
        }
        Ok(state)
    }

    pub fn introspector(&self) -> SchemaIntrospector {
        SchemaIntrospector::new(self.db.datashare_pool().clone(), self.cache.clone())
    }

    pub fn repository(&self) -> DynamicRepository {
        DynamicRepository::new(self.introspector(), self.config.database.enable_query_logging)
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.main_pool().clone())
    }

    pub fn metadata(&self) -> MetadataService {
        MetadataService::new(self.db.main_pool().clone())
    }

    pub fn access(&self) -> AccessService {
        AccessService::new(self.db.main_pool().clone(), self.introspector())
    }

    pub fn tables(&self) -> TableService {
        TableService::new(self.repository(), self.metadata(), self.access())
    }

    pub fn search(&self) -> SearchService {
        SearchService::new(self.repository(), self.metadata(), self.access())
    }

    pub fn files(&self) -> FileService {
        FileService::new(self.db.main_pool().clone(), self.blobs.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;

    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .merge(auth_public_routes())
        // Token + live session
        .merge(protected_routes(state.clone()))
        // Token + live session + admin
        .merge(elevated_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() || config.security.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use axum::routing::{post, put};
    use handlers::protected::{auth, files, rows, search, tables, users};

    Router::new()
        // Session
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Tables the caller can see
        .route("/api/data/tables", get(tables::list))
        .route("/api/data/tables/:name", get(tables::show))
        .route("/api/data/tables/:name/data", get(tables::data))
        .route("/api/data/tables/:name/export", get(tables::export))
        .route("/api/data/search", get(search::search))
        // Row edits are gated by the edit capability, not by role
        .route("/api/data/admin/tables/:name/rows", post(rows::create))
        .route(
            "/api/data/admin/tables/:name/rows/:row_id",
            put(rows::update).delete(rows::delete),
        )
        // Own account
        .route("/api/users/:id", get(users::show).put(users::update).delete(users::delete))
        // Files
        .route("/api/files", get(files::list).post(files::upload))
        .route("/api/files/:id", get(files::download).delete(files::delete))
        .route("/api/files/:id/copy", post(files::copy))
        .route("/api/files/:id/share", put(files::share))
        .route("/api/files/:id/rename", put(files::rename))
        .layer(middleware::from_fn_with_state(state.clone(), validate_user_middleware))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn elevated_routes(state: AppState) -> Router<AppState> {
    use axum::routing::{delete, post, put};
    use handlers::elevated::{access, search, tables, users};

    Router::new()
        .route("/api/data/admin/database-tables", get(tables::database_tables))
        .route("/api/data/admin/tables", get(tables::list).post(tables::register))
        .route("/api/data/admin/tables/:name", put(tables::update).delete(tables::drop))
        .route("/api/data/admin/import-table", post(tables::import))
        .route("/api/data/admin/access", get(access::list).post(access::grant))
        .route("/api/data/admin/access/:id", delete(access::revoke))
        .route("/api/data/admin/search", get(search::search))
        .route("/api/users", get(users::list).post(users::create))
        .layer(middleware::from_fn(require_admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), validate_user_middleware))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}
