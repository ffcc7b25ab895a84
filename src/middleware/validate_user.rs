use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{AccessGate, Claims};
use crate::database::models::User;
use crate::error::ApiError;

/// The live user record behind a validated token
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

/// Loads the token's user and enforces one active session per account: the
/// nonce embedded at login must still be the one stored on the user.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state
        .users()
        .find(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if user.session_nonce.as_deref() != Some(claims.sid.as_str()) {
        tracing::warn!("Rejected superseded session for user {}", user.id);
        return Err(ApiError::unauthorized("Session is no longer valid, please log in again"));
    }

    tracing::debug!("Validated user {} ({})", user.username, user.role);
    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

/// Gate for admin-only route groups; runs after `validate_user_middleware`
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let AuthUser(user) = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !AccessGate::is_admin(user) {
        return Err(ApiError::forbidden("Administrator access required"));
    }
    Ok(next.run(request).await)
}
