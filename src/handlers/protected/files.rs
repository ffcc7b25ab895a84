use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::FileRecord;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::FileListQuery;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub filename: Option<String>,
}

/// POST /api/files - multipart upload, field `file`
pub async fn upload(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<FileRecord> {
    while let Some(field) = multipart
        .next_field()
        .await?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        let record = state.files().upload(&user, &filename, &bytes).await?;
        return Ok(ApiResponse::created(record));
    }
    Err(ApiError::bad_request("No file part in the request"))
}

/// GET /api/files?shared=&all=
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<FileListQuery>,
) -> ApiResult<Vec<FileRecord>> {
    Ok(ApiResponse::success(state.files().list(&user, &query).await?))
}

/// GET /api/files/:id - raw bytes as an attachment
pub async fn download(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let (file, bytes) = state.files().download(&user, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/files/:id - owner or admin
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    state.files().delete(&user, id).await?;
    Ok(ApiResponse::success(json!({ "message": "File deleted" })))
}

/// POST /api/files/:id/copy - private copy of a shared file
pub async fn copy(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<FileRecord> {
    Ok(ApiResponse::created(state.files().copy(&user, id).await?))
}

/// PUT /api/files/:id/share - toggle sharing
pub async fn share(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<FileRecord> {
    Ok(ApiResponse::success(state.files().toggle_share(&user, id).await?))
}

/// PUT /api/files/:id/rename
pub async fn rename(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    body: Option<Json<RenameRequest>>,
) -> ApiResult<FileRecord> {
    let name = body.and_then(|Json(r)| r.filename).unwrap_or_default();
    Ok(ApiResponse::success(state.files().rename(&user, id, &name).await?))
}
