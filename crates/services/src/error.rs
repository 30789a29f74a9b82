//! Shared error types for the services crate.

use thiserror::Error;

use hunt_core::model::UserError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("username already exists")]
    UsernameTaken,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Users(#[from] UserServiceError),
}
