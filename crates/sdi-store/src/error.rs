//! Error type for database operations.

use sdi_core::{EntityKind, SdiError};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure, including constraint violations
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// A stored value could not be decoded back into the model
    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error(transparent)]
    Model(#[from] SdiError),
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            table,
            message: message.into(),
        }
    }
}

impl From<StoreError> for SdiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Sqlite(e) => SdiError::Integrity(e.to_string()),
            StoreError::DuplicateName { kind, name } => SdiError::DuplicateName { kind, name },
            StoreError::NotFound { kind, name } => SdiError::NotFound { kind, name },
            StoreError::Corrupt { table, message } => {
                SdiError::Integrity(format!("corrupt row in {table}: {message}"))
            }
            StoreError::Model(e) => e,
        }
    }
}
