pub mod column;
pub mod file;
pub mod table_access;
pub mod table_metadata;
pub mod user;

pub use column::{primary_key_columns, ColumnInfo, PRIMARY_KEY_ROLE};
pub use file::FileRecord;
pub use table_access::{TableAccess, TableAccessListing};
pub use table_metadata::TableMetadata;
pub use user::{User, ROLE_ADMIN, ROLE_USER};
