use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::database::query_builder::DEFAULT_PRIMARY_KEY;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
pub struct RowQuery {
    pub primary_key: Option<String>,
}

impl RowQuery {
    fn key(&self) -> &str {
        self.primary_key.as_deref().filter(|k| !k.is_empty()).unwrap_or(DEFAULT_PRIMARY_KEY)
    }
}

fn payload(body: Option<Json<Map<String, Value>>>) -> Map<String, Value> {
    body.map(|Json(map)| map).unwrap_or_default()
}

/// POST /api/data/admin/tables/:name/rows
pub async fn create(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
    body: Option<Json<Map<String, Value>>>,
) -> ApiResult<Value> {
    let id = state.tables().insert_row(&user, &name, &payload(body)).await?;
    Ok(ApiResponse::created(json!({ "id": id, "message": "Row created" })))
}

/// PUT /api/data/admin/tables/:name/rows/:row_id?primary_key=
pub async fn update(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((name, row_id)): Path<(String, String)>,
    Query(query): Query<RowQuery>,
    body: Option<Json<Map<String, Value>>>,
) -> ApiResult<Value> {
    let affected = state
        .tables()
        .update_row(&user, &name, query.key(), &row_id, &payload(body))
        .await?;
    Ok(ApiResponse::success(json!({ "affected_rows": affected, "message": "Row updated" })))
}

/// DELETE /api/data/admin/tables/:name/rows/:row_id?primary_key=
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((name, row_id)): Path<(String, String)>,
    Query(query): Query<RowQuery>,
) -> ApiResult<Value> {
    let affected = state.tables().delete_row(&user, &name, query.key(), &row_id).await?;
    Ok(ApiResponse::success(json!({ "affected_rows": affected, "message": "Row deleted" })))
}
