use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, SortDirection, SqlResult};
use crate::database::identifier::quote_identifier;
use crate::database::models::ColumnInfo;

/// SELECT builder for a dynamic table.
///
/// The table name must already be resolved against the live table list. The
/// projected and ORDER BY columns are checked against `columns`, the
/// introspected column list. Search values are always bound parameters.
pub struct Filter {
    table_name: String,
    columns: Vec<ColumnInfo>,
    select_columns: Vec<String>,
    search: Option<(String, Vec<Value>)>,
    order_data: Option<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>, columns: &[ColumnInfo]) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        Ok(Self {
            table_name,
            columns: columns.to_vec(),
            select_columns: vec![],
            search: None,
            order_data: None,
            limit: None,
            offset: None,
        })
    }

    /// Restrict the projection; an empty list or `*` reads every column
    pub fn select(&mut self, columns: &[String]) -> Result<&mut Self, FilterError> {
        if let Some(unknown) = columns.iter().find(|c| *c != "*" && !self.has_column(c)) {
            return Err(FilterError::InvalidColumn(unknown.clone()));
        }
        self.select_columns = columns.to_vec();
        Ok(self)
    }

    pub fn search(&mut self, term: &str) -> &mut Self {
        self.search = FilterWhere::search(&self.columns, Some(term));
        self
    }

    pub fn order(&mut self, sort_by: Option<&str>, sort: SortDirection) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(sort_by, sort, &self.columns)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = self.where_parts();
        let query = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM {}", quote_identifier(&self.table_name)),
            if where_clause.is_empty() { String::new() } else { format!("WHERE {}", where_clause) },
            FilterOrder::generate(self.order_data.as_ref()),
            self.build_limit_clause(),
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let (where_clause, params) = self.where_parts();
        let query = if where_clause.is_empty() {
            format!("SELECT COUNT(*) AS count FROM {}", quote_identifier(&self.table_name))
        } else {
            format!("SELECT COUNT(*) AS count FROM {} WHERE {}", quote_identifier(&self.table_name), where_clause)
        };
        SqlResult { query, params }
    }

    fn where_parts(&self) -> (String, Vec<Value>) {
        match &self.search {
            Some((clause, params)) => (clause.clone(), params.clone()),
            None => (String::new(), vec![]),
        }
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}
