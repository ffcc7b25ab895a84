use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::identifier::quote_identifier;
use crate::database::models::ColumnInfo;

pub struct FilterOrder;

impl FilterOrder {
    /// Single-column ordering; the column must be one of the live columns
    pub fn validate_and_parse(
        sort_by: Option<&str>,
        sort: SortDirection,
        columns: &[ColumnInfo],
    ) -> Result<Option<FilterOrderInfo>, FilterError> {
        let column = match sort_by.filter(|s| !s.is_empty()) {
            Some(column) => column,
            None => return Ok(None),
        };
        if !columns.iter().any(|c| c.name == column) {
            return Err(FilterError::InvalidColumn(column.to_string()));
        }
        Ok(Some(FilterOrderInfo { column: column.to_string(), sort }))
    }

    pub fn generate(info: Option<&FilterOrderInfo>) -> String {
        match info {
            Some(i) => format!("ORDER BY {} {}", quote_identifier(&i.column), i.sort.to_sql()),
            None => String::new(),
        }
    }
}
