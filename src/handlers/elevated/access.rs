use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{TableAccess, TableAccessListing};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{BatchGrantResult, GrantRequest};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GrantOutcome {
    Single(TableAccess),
    Batch(BatchGrantResult),
}

/// GET /api/data/admin/access - every grant with its username
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<TableAccessListing>> {
    Ok(ApiResponse::success(state.access().list().await?))
}

/// POST /api/data/admin/access
pub async fn grant(State(state): State<AppState>, body: Option<Json<GrantRequest>>) -> ApiResult<GrantOutcome> {
    let Json(request) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;

    if request.is_batch() {
        let result = state.access().grant_batch(&request).await?;
        return Ok(ApiResponse::success(GrantOutcome::Batch(result)));
    }
    let grant = state.access().grant(&request).await?;
    Ok(ApiResponse::created(GrantOutcome::Single(grant)))
}

/// DELETE /api/data/admin/access/:id
pub async fn revoke(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    state.access().revoke(id).await?;
    Ok(ApiResponse::success(json!({ "message": "Access revoked" })))
}
