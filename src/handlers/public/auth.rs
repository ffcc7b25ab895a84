use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{generate_jwt, Claims};
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::NewUser;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

/// POST /api/auth/register - self-service account creation (always role `user`)
pub async fn register(State(state): State<AppState>, body: Option<Json<NewUser>>) -> ApiResult<User> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    let user = state.users().create(&input, false).await?;
    Ok(ApiResponse::created(user))
}

/// POST /api/auth/login - verify credentials and start a new session.
///
/// Each login writes a fresh session nonce, so tokens from earlier logins of
/// the same account stop working even before they expire.
pub async fn login(State(state): State<AppState>, body: Option<Json<LoginRequest>>) -> ApiResult<LoginResponse> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    let (username, password) = match (input.username.as_deref(), input.password.as_deref()) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u.trim(), p),
        _ => return Err(ApiError::bad_request("Username and password are required")),
    };

    let users = state.users();
    let user = users.authenticate(username, password).await?;
    let nonce = users.start_session(user.id).await?;

    let expiry = state.config.security.jwt_expiry_secs;
    let token = generate_jwt(&Claims::new(&user, nonce, expiry), &state.config.security)?;
    let user = users.get(user.id).await?;

    tracing::info!("User {} logged in", user.username);
    Ok(ApiResponse::success(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in: expiry,
        user,
    }))
}
