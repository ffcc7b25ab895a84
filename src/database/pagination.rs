use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::SortDirection;

/// Paging, projection, sorting and search inputs for one table read
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
    /// Columns to return; empty means all
    pub columns: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortDirection,
    pub search: Option<String>,
}

impl PageRequest {
    /// Clamp `per_page` into `[1, max_per_page]` and `page` into
    /// `[1, i64::MAX / per_page]` so the row offset always fits in an `i64`
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: i64, max_per_page: i64) -> Self {
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, max_per_page.max(1));
        Self {
            page: page.unwrap_or(1).clamp(1, i64::MAX / per_page),
            per_page,
            columns: vec![],
            sort_by: None,
            sort_order: SortDirection::Asc,
            search: None,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Page window and row counts returned with every table read.
///
/// `real_total` is the unfiltered row count and may lag concurrent writes.
/// `filtered_total` is exact only when `filtered_total_exact` is true (page 1);
/// on later pages it is estimated from the rows actually returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub real_total: i64,
    pub filtered_total: i64,
    pub filtered_total_exact: bool,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, real_total: i64, filtered_total: i64, exact: bool) -> Self {
        Self {
            page,
            per_page,
            real_total,
            filtered_total,
            filtered_total_exact: exact,
            pages: page_count(filtered_total, per_page),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Map<String, Value>>,
    pub pagination: Pagination,
}

/// Estimate of matching rows for page > 1, derived without a COUNT query.
///
/// Never decreases as `page` grows: page k contributes at least `(k-1)*per_page`.
pub fn estimated_filtered_total(page: i64, per_page: i64, rows_returned: i64) -> i64 {
    (page - 1).saturating_mul(per_page).saturating_add(rows_returned)
}

pub fn page_count(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 || total <= 0 {
        return 0;
    }
    (total - 1) / per_page + 1
}
