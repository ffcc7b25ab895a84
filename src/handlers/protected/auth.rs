use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// POST /api/auth/logout - mark offline and clear the session nonce
pub async fn logout(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<Value> {
    state.users().end_session(user.id).await?;
    tracing::info!("User {} logged out", user.username);
    Ok(ApiResponse::success(json!({ "message": "Logged out" })))
}

/// GET /api/auth/me
pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(user))
}
