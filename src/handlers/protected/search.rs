use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SearchScope, TableSearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// GET /api/data/search?search= - across the tables the caller can view
pub async fn search(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<TableSearchResult>> {
    let term = query.search.unwrap_or_default();
    let results = state.search().search(&user, &term, SearchScope::Accessible).await?;
    Ok(ApiResponse::success(results))
}
