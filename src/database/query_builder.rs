use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use crate::database::identifier::{quote_identifier, sanitize_table_name};
use crate::database::manager::DatabaseError;
use crate::database::models::{primary_key_columns, ColumnInfo};
use crate::filter::types::SqlResult;

/// Name of the synthesized integer key added to imported and key-less tables
pub const SURROGATE_KEY: &str = "id";

/// Default primary-key column for row updates and deletes
pub const DEFAULT_PRIMARY_KEY: &str = "id";

static CREATE_TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([^\s(]+)")
        .expect("valid CREATE TABLE regex")
});

static PRIMARY_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)PRIMARY\s+KEY").expect("valid PRIMARY KEY regex"));

static BARE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

fn surrogate_key_definition() -> String {
    format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_identifier(SURROGATE_KEY))
}

/// Row-level statements for one dynamic table.
///
/// `columns` is the introspected column list; any identifier a statement
/// embeds must appear in it. Values are always bound, never formatted in.
pub struct QueryBuilder<'a> {
    table_name: &'a str,
    columns: &'a [ColumnInfo],
}

impl<'a> QueryBuilder<'a> {
    pub fn new(table_name: &'a str, columns: &'a [ColumnInfo]) -> Self {
        Self { table_name, columns }
    }

    fn require_column(&self, name: &str) -> Result<&ColumnInfo, DatabaseError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DatabaseError::InvalidColumn {
                table: self.table_name.to_string(),
                column: name.to_string(),
            })
    }

    /// `INSERT INTO t (c1, c2) VALUES (?, ?)`
    pub fn insert(&self, payload: &Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        if payload.is_empty() {
            return Err(DatabaseError::InvalidRequest("No column values supplied".to_string()));
        }

        let mut names = Vec::with_capacity(payload.len());
        let mut params = Vec::with_capacity(payload.len());
        for (column, value) in payload {
            let column = self.require_column(column)?;
            names.push(quote_identifier(&column.name));
            params.push(value.clone());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(self.table_name),
            names.join(", "),
            placeholders
        );
        Ok(SqlResult { query, params })
    }

    /// `UPDATE t SET c1 = ?, c2 = ? WHERE pk = ?`
    pub fn update(
        &self,
        primary_key: &str,
        row_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<SqlResult, DatabaseError> {
        if payload.is_empty() {
            return Err(DatabaseError::InvalidRequest("No column values supplied".to_string()));
        }
        let key = self.require_column(primary_key)?;

        let mut assignments = Vec::with_capacity(payload.len());
        let mut params = Vec::with_capacity(payload.len() + 1);
        for (column, value) in payload {
            let column = self.require_column(column)?;
            assignments.push(format!("{} = ?", quote_identifier(&column.name)));
            params.push(value.clone());
        }
        params.push(Value::String(row_id.to_string()));

        let query = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(self.table_name),
            assignments.join(", "),
            quote_identifier(&key.name)
        );
        Ok(SqlResult { query, params })
    }

    /// `DELETE FROM t WHERE pk = ?`
    pub fn delete(&self, primary_key: &str, row_id: &str) -> Result<SqlResult, DatabaseError> {
        let key = self.require_column(primary_key)?;
        let query = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(self.table_name),
            quote_identifier(&key.name)
        );
        Ok(SqlResult { query, params: vec![Value::String(row_id.to_string())] })
    }

    /// Every row, ordered by the primary key when the table has one
    pub fn select_all(&self) -> SqlResult {
        let keys = primary_key_columns(self.columns);
        let order = if keys.is_empty() {
            String::new()
        } else {
            format!(
                " ORDER BY {}",
                keys.iter().map(|k| quote_identifier(k)).collect::<Vec<_>>().join(", ")
            )
        };
        SqlResult {
            query: format!("SELECT * FROM {}{}", quote_identifier(self.table_name), order),
            params: vec![],
        }
    }
}

/// Parameterised insert used for bulk loads into a freshly created table
pub fn insert_statement(table_name: &str, column_names: &[String]) -> String {
    let names: Vec<String> = column_names.iter().map(|c| quote_identifier(c)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table_name),
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    )
}

/// CREATE TABLE for an imported file: surrogate key plus one text column per header
pub fn create_table_from_columns(table_name: &str, column_names: &[String]) -> Result<String, DatabaseError> {
    if !BARE_IDENTIFIER.is_match(table_name) {
        return Err(DatabaseError::InvalidIdentifier(table_name.to_string()));
    }
    if column_names.is_empty() {
        return Err(DatabaseError::InvalidRequest("Imported file has no columns".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    let mut definitions = vec![surrogate_key_definition()];
    for name in column_names {
        if name.eq_ignore_ascii_case(SURROGATE_KEY) {
            return Err(DatabaseError::InvalidRequest(format!(
                "Column '{}' is reserved for the generated key",
                name
            )));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(DatabaseError::InvalidRequest(format!("Duplicate column '{}'", name)));
        }
        definitions.push(format!("{} TEXT", quote_identifier(name)));
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table_name),
        definitions.join(", ")
    ))
}

/// A caller-supplied CREATE TABLE after normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatement {
    pub table_name: String,
    pub sql: String,
    pub injected_key: bool,
}

/// Normalise a caller-supplied CREATE TABLE statement.
///
/// The table name is sanitized and re-quoted in place. When the text has no
/// `PRIMARY KEY` anywhere, the surrogate key definition is injected as the
/// first column.
pub fn create_table_from_sql(statement: &str) -> Result<CreateStatement, DatabaseError> {
    let statement = statement.trim();
    let statement = statement.strip_suffix(';').unwrap_or(statement).trim_end();
    if statement.contains(';') {
        return Err(DatabaseError::InvalidRequest(
            "Only a single CREATE TABLE statement is accepted".to_string(),
        ));
    }

    let captures = CREATE_TABLE_NAME
        .captures(statement)
        .ok_or_else(|| DatabaseError::InvalidRequest("Statement is not a CREATE TABLE".to_string()))?;
    let name_match = captures
        .get(1)
        .ok_or_else(|| DatabaseError::InvalidRequest("Missing table name".to_string()))?;

    let table_name = sanitize_table_name(name_match.as_str());
    if !BARE_IDENTIFIER.is_match(&table_name) {
        return Err(DatabaseError::InvalidIdentifier(table_name));
    }

    let rest = &statement[name_match.end()..];
    let open = rest.find('(').ok_or_else(|| {
        DatabaseError::InvalidRequest("CREATE TABLE requires a column definition list".to_string())
    })?;
    if !rest[..open].trim().is_empty() {
        return Err(DatabaseError::InvalidRequest(
            "CREATE TABLE requires a column definition list".to_string(),
        ));
    }

    let head = &statement[..name_match.start()];
    let body = &rest[open + 1..];
    let injected_key = !PRIMARY_KEY.is_match(statement);
    let sql = if injected_key {
        format!("{}{} ({}, {}", head, quote_identifier(&table_name), surrogate_key_definition(), body.trim_start())
    } else {
        format!("{}{} ({}", head, quote_identifier(&table_name), body)
    };

    Ok(CreateStatement { table_name, sql, injected_key })
}

/// Idempotent drop; never fails on absence
pub fn drop_table(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name))
}

/// Bind a JSON value as a positional parameter
pub fn bind_param<'q>(
    q: Query<'q, Sqlite, SqliteArguments<'q>>,
    v: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        // Nested values are stored as their JSON text
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}
