use axum::{
    extract::{Query, State},
    Extension,
};

use crate::app::AppState;
use crate::handlers::protected::search::SearchQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SearchScope, TableSearchResult};

/// GET /api/data/admin/search?search= - every table, registered or not
pub async fn search(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<TableSearchResult>> {
    let term = query.search.unwrap_or_default();
    Ok(ApiResponse::success(state.search().search(&user, &term, SearchScope::All).await?))
}
