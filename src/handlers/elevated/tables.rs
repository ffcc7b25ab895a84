use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::TableMetadata;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::table_service::{DatabaseTable, DropOutcome};
use crate::services::{ImportOutcome, MetadataUpdate};

#[derive(Debug, Deserialize)]
pub struct SqlImportRequest {
    #[serde(rename = "type")]
    pub import_type: Option<String>,
    pub sql_statement: Option<String>,
}

/// GET /api/data/admin/database-tables - physical tables and registration state
pub async fn database_tables(State(state): State<AppState>) -> ApiResult<Vec<DatabaseTable>> {
    Ok(ApiResponse::success(state.tables().database_tables().await?))
}

/// GET /api/data/admin/tables - all metadata, inactive included
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<TableMetadata>> {
    Ok(ApiResponse::success(state.tables().list_metadata().await?))
}

/// POST /api/data/admin/tables - register or overwrite metadata for an existing table
pub async fn register(State(state): State<AppState>, body: Option<Json<MetadataUpdate>>) -> ApiResult<TableMetadata> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    Ok(ApiResponse::created(state.tables().register(&input).await?))
}

/// PUT /api/data/admin/tables/:name
pub async fn update(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<MetadataUpdate>>,
) -> ApiResult<TableMetadata> {
    let Json(input) = body.ok_or_else(|| ApiError::bad_request("Request body must be JSON"))?;
    Ok(ApiResponse::success(state.tables().update_metadata(&name, &input).await?))
}

/// DELETE /api/data/admin/tables/:name - drop table, metadata and grants
pub async fn drop(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<DropOutcome> {
    Ok(ApiResponse::success(state.tables().drop_table(&name).await?))
}

/// POST /api/data/admin/import-table
///
/// multipart `type=file, table_name, file` loads a CSV/spreadsheet into a new
/// table; JSON `{"type": "sql", "sql_statement": ...}` runs one CREATE TABLE.
pub async fn import(State(state): State<AppState>, request: Request) -> ApiResult<ImportOutcome> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let outcome = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        import_file(&state, multipart).await?
    } else {
        let Json(body) = Json::<SqlImportRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if body.import_type.as_deref() != Some("sql") {
            return Err(ApiError::bad_request("Invalid import type"));
        }
        state
            .tables()
            .import_sql(body.sql_statement.as_deref().unwrap_or_default())
            .await?
    };
    Ok(ApiResponse::created(outcome))
}

async fn import_file(state: &AppState, mut multipart: Multipart) -> Result<ImportOutcome, ApiError> {
    let mut import_type = None;
    let mut table_name = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => import_type = Some(field.text().await?),
            "table_name" => table_name = Some(field.text().await?),
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    if import_type.as_deref().unwrap_or("file") != "file" {
        return Err(ApiError::bad_request("Invalid import type"));
    }
    let table_name = table_name
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("table_name is required"))?;
    let (filename, bytes) = file
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("No file selected"))?;

    Ok(state.tables().import_file(&table_name, &filename, bytes).await?)
}
