use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::TableMetadata;
use crate::database::pagination::{Page, PageRequest};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TableDescription;

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Comma-separated projection, e.g. `id,name`
    pub columns: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

impl DataQuery {
    fn into_request(self, state: &AppState) -> Result<PageRequest, ApiError> {
        let api = &state.config.api;
        let mut request = PageRequest::new(
            self.page,
            self.per_page,
            api.default_per_page as i64,
            api.max_per_page as i64,
        );
        request.columns = self
            .columns
            .as_deref()
            .map(|list| list.split(',').map(str::trim).filter(|c| !c.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        request.sort_by = self.sort_by.filter(|s| !s.is_empty());
        request.sort_order = match self.sort_order.as_deref() {
            Some(order) if !order.is_empty() => SortDirection::parse(order)?,
            _ => SortDirection::Asc,
        };
        request.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// GET /api/data/tables - tables the caller can view
pub async fn list(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<Vec<TableMetadata>> {
    Ok(ApiResponse::success(state.tables().list_for(&user).await?))
}

/// GET /api/data/tables/:name - metadata, columns and the caller's capabilities
pub async fn show(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<TableDescription> {
    Ok(ApiResponse::success(state.tables().describe(&user, &name).await?))
}

/// GET /api/data/tables/:name/data?page&per_page&columns&sort_by&sort_order&search
///
/// `pagination.filtered_total` is exact on page 1 only; later pages carry an
/// estimate and `filtered_total_exact: false`.
pub async fn data(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
    Query(query): Query<DataQuery>,
) -> ApiResult<Page> {
    let request = query.into_request(&state)?;
    Ok(ApiResponse::success(state.tables().fetch_data(&user, &name, &request).await?))
}

/// GET /api/data/tables/:name/export?format=csv|excel - file download
pub async fn export(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = query.format.unwrap_or_else(|| "csv".to_string());
    let file = state.tables().export(&user, &name, &format).await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
