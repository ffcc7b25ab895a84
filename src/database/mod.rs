pub mod cache;
pub mod dynamic;
pub mod identifier;
pub mod introspect;
pub mod manager;
pub mod models;
pub mod pagination;
pub mod query_builder;

pub use cache::MetadataCache;
pub use dynamic::{DynamicRepository, TableDump};
pub use introspect::SchemaIntrospector;
pub use manager::{DatabaseError, DatabaseManager, LogicalDatabase};
pub use pagination::{Page, PageRequest, Pagination};
