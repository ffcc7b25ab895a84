pub mod access_service;
pub mod file_service;
pub mod metadata_service;
pub mod search_service;
pub mod table_service;
pub mod user_service;

pub use access_service::{AccessService, BatchGrantResult, GrantRequest};
pub use file_service::{FileListQuery, FileService};
pub use metadata_service::{MetadataService, MetadataUpdate};
pub use search_service::{SearchHit, SearchScope, SearchService, TableSearchResult};
pub use table_service::{ImportOutcome, TableDescription, TableService};
pub use user_service::{NewUser, UserService, UserUpdate};

use crate::database::manager::DatabaseError;
use crate::storage::StorageError;
use crate::transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
