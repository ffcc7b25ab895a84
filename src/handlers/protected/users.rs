use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AccessGate;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::UserUpdate;

/// GET /api/users/:id - admin, or the user themself
pub async fn show(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<User> {
    if !AccessGate::is_admin(&user) && user.id != id {
        return Err(ApiError::forbidden("You can only view your own account"));
    }
    Ok(ApiResponse::success(state.users().get(id).await?))
}

/// PUT /api/users/:id - only admins may change roles
pub async fn update(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    body: Option<Json<UserUpdate>>,
) -> ApiResult<User> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    Ok(ApiResponse::success(state.users().update(id, &input, &user).await?))
}

/// DELETE /api/users/:id - admin only; grants and files go with the user
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    if !AccessGate::is_admin(&user) {
        return Err(ApiError::forbidden("Administrator access required"));
    }
    if user.id == id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }
    let target = state.users().get(id).await?;
    state.files().purge_user(target.id).await?;
    state.users().delete(target.id, &user).await?;
    Ok(ApiResponse::success(json!({ "message": format!("User {} deleted", target.username) })))
}
