// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed repository outcomes.

/// SQLSTATE raised when a serializable transaction loses a conflict.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Repository error.
///
/// The first four variants carry caller-facing messages. The database
/// variants carry internal detail that must only reach the logs.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Invalid lookup field or malformed lookup value
    #[error("{0}")]
    BadInput(String),
    /// Entity absent
    #[error("{0}")]
    NotFound(String),
    /// Uniqueness or state invariant violated
    #[error("{0}")]
    Conflict(String),
    /// Resource exists but belongs to another principal
    #[error("access denied to {resource}")]
    PermissionDenied { resource: &'static str },
    /// Could not open a transaction
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),
    /// Could not commit a transaction
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),
    /// Any other database failure
    #[error("database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Classify a query failure.
    ///
    /// A serialization failure or unique violation means a concurrent
    /// transaction won the race, which callers see as a conflict.
    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        match conflict_message(&source) {
            Some(message) => StorageError::Conflict(message.to_string()),
            None => StorageError::Database { operation, source },
        }
    }

    /// Classify a commit failure. Serializable commits can fail on conflict too.
    pub fn commit(source: sqlx::Error) -> Self {
        match conflict_message(&source) {
            Some(message) => StorageError::Conflict(message.to_string()),
            None => StorageError::Commit(source),
        }
    }

    /// Whether the error is an infrastructure failure rather than a caller outcome.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            StorageError::Begin(_) | StorageError::Commit(_) | StorageError::Database { .. }
        )
    }
}

fn conflict_message(error: &sqlx::Error) -> Option<&'static str> {
    let code = error.as_database_error()?.code()?;
    match code.as_ref() {
        SERIALIZATION_FAILURE => Some("concurrent modification detected, please retry"),
        UNIQUE_VIOLATION => Some("resource already exists"),
        _ => None,
    }
}
