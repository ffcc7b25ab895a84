use axum::{extract::State, Json};

use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::NewUser;

/// GET /api/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.users().list().await?))
}

/// POST /api/users - admins may pick the role
pub async fn create(State(state): State<AppState>, body: Option<Json<NewUser>>) -> ApiResult<User> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    Ok(ApiResponse::created(state.users().create(&input, true).await?))
}
