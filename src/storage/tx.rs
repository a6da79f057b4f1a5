// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction helpers with explicit isolation levels.
//!
//! Every repository operation follows the same shape:
//!
//! ```rust,ignore
//! let mut tx = begin(&pool, Isolation::Serializable).await?;
//! let result = do_work(&mut tx).await;
//! finish(tx, result, "wallet.create").await
//! ```
//!
//! `finish` commits on success and rolls back on error. A transaction
//! dropped before `finish` runs (request timeout, panic) is rolled back by
//! `sqlx` when the handle is dropped, so nothing partially commits.

use sqlx::{PgPool, Postgres, Transaction};

use super::{StorageError, StorageResult};

pub type PgTransaction = Transaction<'static, Postgres>;

/// Isolation level for one repository operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Guarded writes: pre-check and write are atomic against other
    /// serializable transactions on the same keys.
    Serializable,
    /// Plain reads.
    ReadCommitted,
}

impl Isolation {
    pub fn statement(&self) -> &'static str {
        match self {
            Isolation::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            Isolation::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
        }
    }
}

/// Open a transaction at the given isolation level.
pub async fn begin(pool: &PgPool, isolation: Isolation) -> StorageResult<PgTransaction> {
    let mut tx = pool.begin().await.map_err(StorageError::Begin)?;
    sqlx::query(isolation.statement())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::database("set isolation level", e))?;
    Ok(tx)
}

/// Commit on `Ok`, roll back on `Err`.
///
/// A rollback failure is logged and the original error is returned.
pub async fn finish<T>(
    tx: PgTransaction,
    result: StorageResult<T>,
    operation: &'static str,
) -> StorageResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(operation, error = %e, "transaction commit failed");
                StorageError::commit(e)
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    operation,
                    error = %rollback_err,
                    original_error = %err,
                    "transaction rollback failed"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_statements() {
        assert_eq!(
            Isolation::Serializable.statement(),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(
            Isolation::ReadCommitted.statement(),
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED"
        );
    }
}
