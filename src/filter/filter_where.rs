use serde_json::Value;

use crate::database::identifier::quote_identifier;
use crate::database::models::ColumnInfo;

const LIKE_ESCAPE: char = '\\';

/// Builds the full-row search predicate: an OR-chain of `LIKE` matches over
/// every non-primary-key column.
pub struct FilterWhere;

impl FilterWhere {
    /// Columns a search term is matched against; primary keys never are
    pub fn searchable_columns(columns: &[ColumnInfo]) -> Vec<&ColumnInfo> {
        columns.iter().filter(|c| !c.is_primary_key()).collect()
    }

    /// `None` when there is no term or nothing to search
    pub fn search(columns: &[ColumnInfo], term: Option<&str>) -> Option<(String, Vec<Value>)> {
        let term = term.filter(|t| !t.is_empty())?;
        let searchable = Self::searchable_columns(columns);
        if searchable.is_empty() {
            return None;
        }

        let pattern = format!("%{}%", Self::escape_like(term));
        let conditions: Vec<String> = searchable
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '{}'", quote_identifier(&c.name), LIKE_ESCAPE))
            .collect();
        let params = vec![Value::String(pattern); conditions.len()];

        Some((format!("({})", conditions.join(" OR ")), params))
    }

    /// Match the term literally: LIKE wildcards in user text are escaped
    pub fn escape_like(term: &str) -> String {
        let mut escaped = String::with_capacity(term.len());
        for c in term.chars() {
            if c == LIKE_ESCAPE || c == '%' || c == '_' {
                escaped.push(LIKE_ESCAPE);
            }
            escaped.push(c);
        }
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, key: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: "TEXT".to_string(),
            nullable: true,
            key: key.to_string(),
            default: None,
            extra: String::new(),
        }
    }

    #[test]
    fn excludes_primary_key_columns() {
        let columns = vec![col("id", "PRI"), col("name", ""), col("city", "")];
        let (clause, params) = FilterWhere::search(&columns, Some("os")).unwrap();
        assert_eq!(clause, "(\"name\" LIKE ? ESCAPE '\\' OR \"city\" LIKE ? ESCAPE '\\')");
        assert!(!clause.contains("\"id\""));
        assert_eq!(params, vec![Value::String("%os%".into()), Value::String("%os%".into())]);
    }

    #[test]
    fn composite_keys_are_all_excluded() {
        let columns = vec![col("a", "PRI"), col("b", "PRI"), col("note", "")];
        let names: Vec<&str> = FilterWhere::searchable_columns(&columns).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["note"]);
    }

    #[test]
    fn no_predicate_without_term_or_columns() {
        let columns = vec![col("id", "PRI"), col("name", "")];
        assert!(FilterWhere::search(&columns, None).is_none());
        assert!(FilterWhere::search(&columns, Some("")).is_none());
        assert!(FilterWhere::search(&[col("id", "PRI")], Some("x")).is_none());
    }

    #[test]
    fn escapes_wildcards() {
        assert_eq!(FilterWhere::escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
