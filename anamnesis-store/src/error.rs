//! Error types for result storage.

use anamnesis_core::StoreError;
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from libSQL.
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    /// Invalid data in the database, or a row that does not fit the table.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Database(e) => StoreError::Backend(e.to_string()),
            Error::InvalidData(msg) => StoreError::InvalidRow(msg),
        }
    }
}
