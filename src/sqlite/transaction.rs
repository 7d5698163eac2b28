use std::fmt;

use crate::error::AdapterError;
use crate::lock::LockRelease;
use crate::types::{SqlQuery, SqlResultSet, TransactionOptions};

use super::connection::{SharedSqliteConnection, execute_on, lock_slot, query_on, run_blocking};

/// An open `BEGIN` scope. Owns the adapter's lock until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) consumes it.
///
/// Queries issued through the handle run directly on the connection; re-acquiring the
/// adapter's lock here would deadlock.
pub struct TransactionHandle {
    conn: SharedSqliteConnection,
    release: Option<LockRelease>,
}

impl TransactionHandle {
    pub(crate) fn new(conn: SharedSqliteConnection, release: LockRelease) -> Self {
        Self {
            conn,
            release: Some(release),
        }
    }

    /// SQLite reports affected-row counts itself, so no phantom query is needed.
    #[must_use]
    pub fn options(&self) -> TransactionOptions {
        TransactionOptions {
            use_phantom_query: false,
        }
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.release.is_some() {
            Ok(())
        } else {
            Err(AdapterError::TransactionClosed)
        }
    }

    /// Query inside the transaction.
    ///
    /// # Errors
    /// Returns `AdapterError` if the query fails or the handle already lost its lock.
    pub async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, AdapterError> {
        self.ensure_open()?;
        query_on(self.conn.clone(), None, query).await
    }

    /// Execute a statement inside the transaction and return rows changed.
    ///
    /// # Errors
    /// Returns `AdapterError` if the statement fails or the handle already lost its lock.
    pub async fn execute_raw(&self, query: &SqlQuery) -> Result<usize, AdapterError> {
        self.ensure_open()?;
        execute_on(self.conn.clone(), None, query).await
    }

    /// Issue `COMMIT`; the lock is released whether or not it succeeds.
    ///
    /// # Errors
    /// Returns the engine error if `COMMIT` fails.
    pub async fn commit(mut self) -> Result<(), AdapterError> {
        self.finish("COMMIT").await
    }

    /// Issue `ROLLBACK`; the lock is released whether or not it succeeds.
    ///
    /// # Errors
    /// Returns the engine error if `ROLLBACK` fails.
    pub async fn rollback(mut self) -> Result<(), AdapterError> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), AdapterError> {
        let release = self.release.take().ok_or(AdapterError::TransactionClosed)?;
        let result = run_blocking(self.conn.clone(), Some(release), move |conn| {
            conn.execute_batch(statement)
                .map_err(AdapterError::SqliteError)
        })
        .await;
        tracing::debug!(statement, ok = result.is_ok(), "sqlite transaction finished");
        result
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("open", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        tracing::warn!("sqlite transaction dropped without commit or rollback; rolling back");
        let conn = self.conn.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = run_blocking(conn, Some(release), |guard| {
                    guard
                        .execute_batch("ROLLBACK")
                        .map_err(AdapterError::SqliteError)
                })
                .await;
            });
        } else {
            if let Ok(mut slot) = lock_slot(&conn)
                && let Some(guard) = slot.as_mut()
            {
                let _ = guard.execute_batch("ROLLBACK");
            }
            release.release();
        }
    }
}
