use serde::{Deserialize, Serialize};

/// Key role reported for primary-key columns
pub const PRIMARY_KEY_ROLE: &str = "PRI";

/// Live column description of a dynamic table, as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// "PRI" for primary-key columns, empty otherwise
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

impl ColumnInfo {
    pub fn is_primary_key(&self) -> bool {
        self.key == PRIMARY_KEY_ROLE
    }
}

/// Names of the primary-key columns, in declaration order
pub fn primary_key_columns(columns: &[ColumnInfo]) -> Vec<&str> {
    columns.iter().filter(|c| c.is_primary_key()).map(|c| c.name.as_str()).collect()
}
