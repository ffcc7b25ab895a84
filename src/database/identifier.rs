//! Table-name normalisation and identifier quoting for dynamically built SQL.

const QUOTE_CHARS: &[char] = &['\'', '"', '`'];

/// Reduce a user-supplied table name to its bare identifier.
///
/// `db.table` keeps only the part after the last `.`, then surrounding single,
/// double and backtick quotes are stripped. Nothing is rejected here; a name
/// that is still malformed simply fails the later existence check.
pub fn sanitize_table_name(raw: &str) -> String {
    let unqualified = match raw.rfind('.') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    };
    unqualified.trim_matches(QUOTE_CHARS).to_string()
}

/// Quote an identifier for embedding in SQL; embedded quotes are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Human readable name for a table: `sales_2024_q1` -> `Sales 2024 Q1`
pub fn display_name_for(table_name: &str) -> String {
    table_name
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
