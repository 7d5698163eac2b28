use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::AdapterError;
use crate::lock::{AsyncExclusiveLock, LockRelease};
use crate::types::{ConnectionInfo, IsolationLevel, SqlQuery, SqlResultSet};

use super::params::map_args;
use super::query::build_result_set;
use super::transaction::TransactionHandle;

pub const PROVIDER: &str = "sqlite";
pub const ADAPTER_NAME: &str = env!("CARGO_PKG_NAME");

/// The engine handle. `None` once the adapter has been disposed.
///
/// The inner mutex is only ever taken on the blocking pool while the adapter's FIFO lock is
/// held, so it is uncontended in practice.
pub(crate) type SharedSqliteConnection = Arc<Mutex<Option<rusqlite::Connection>>>;

/// Driver adapter over a single SQLite connection.
///
/// Any number of tasks may share one adapter; every operation takes the adapter's FIFO lock
/// for its duration, so statements never interleave on the connection.
///
/// Once the lock is granted it travels with the engine call onto the blocking pool and is
/// released only when that call returns. A caller that is cancelled while queued leaves no
/// trace; one cancelled after the grant cannot hand the lock on early.
pub struct ConnectionAdapter {
    conn: SharedSqliteConnection,
    lock: AsyncExclusiveLock,
}

impl ConnectionAdapter {
    pub(crate) fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            lock: AsyncExclusiveLock::new(),
        }
    }

    pub(crate) fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&self.conn)
    }

    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            provider: PROVIDER,
            adapter_name: ADAPTER_NAME,
            schema_name: None,
        }
    }

    /// Run a query and return the fully materialized, marshalled result set.
    ///
    /// # Errors
    /// Returns `AdapterError` if preparing, binding, or executing the query fails.
    pub async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, AdapterError> {
        let release = self.lock.acquire().await;
        query_on(self.conn_handle(), Some(release), query).await
    }

    /// Execute a statement and return the number of rows it changed.
    ///
    /// # Errors
    /// Returns `AdapterError` if preparing, binding, or executing the statement fails.
    pub async fn execute_raw(&self, query: &SqlQuery) -> Result<usize, AdapterError> {
        let release = self.lock.acquire().await;
        execute_on(self.conn_handle(), Some(release), query).await
    }

    /// Execute a multi-statement script (migrations, DDL). No parameters are supported.
    ///
    /// # Errors
    /// Returns `AdapterError` if any statement in the script fails.
    pub async fn execute_script(&self, script: &str) -> Result<(), AdapterError> {
        let release = self.lock.acquire().await;
        let script = script.to_owned();
        run_blocking(self.conn_handle(), Some(release), move |conn| {
            conn.execute_batch(&script).map_err(AdapterError::SqliteError)
        })
        .await
    }

    /// Begin a transaction that holds the adapter's lock until commit or rollback.
    ///
    /// Only `Serializable` (or no preference) is accepted; any other level is rejected before
    /// the lock is requested.
    ///
    /// `BEGIN` and the construction of the handle run on their own task. If the caller goes
    /// away after the lock was granted, that task still ends up owning the handle, and dropping
    /// it rolls the transaction back.
    ///
    /// # Errors
    /// Returns `AdapterError::InvalidIsolationLevel` for unsupported levels, or the engine error
    /// if `BEGIN` fails (the lock is released first).
    pub async fn start_transaction(
        &self,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, AdapterError> {
        if let Some(level) = isolation_level
            && level != IsolationLevel::Serializable
        {
            return Err(AdapterError::InvalidIsolationLevel(level));
        }

        let release = self.lock.acquire().await;
        let conn = self.conn_handle();
        tokio::spawn(async move {
            // a failed BEGIN drops the capability inside the blocking call
            let release = run_blocking(Arc::clone(&conn), None, move |guard| {
                guard.execute_batch("BEGIN")?;
                Ok(release)
            })
            .await?;
            tracing::debug!("sqlite transaction started");
            Ok::<_, AdapterError>(TransactionHandle::new(conn, release))
        })
        .await
        .map_err(|e| join_error("spawn", &e))?
    }

    /// Close the underlying connection. Every later call fails with `AdapterError::Disposed`.
    ///
    /// # Errors
    /// Returns the engine error if SQLite refuses to close; the connection then stays usable.
    pub async fn dispose(&self) -> Result<(), AdapterError> {
        let release = self.lock.acquire().await;
        let result = run_blocking_raw(self.conn_handle(), Some(release), |slot| {
            let Some(conn) = slot.take() else {
                return Ok(());
            };
            conn.close().map_err(|(conn, err)| {
                *slot = Some(conn);
                AdapterError::SqliteError(err)
            })
        })
        .await;
        if result.is_ok() {
            tracing::debug!("sqlite adapter disposed");
        }
        result
    }
}

impl fmt::Debug for ConnectionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAdapter")
            .field("provider", &PROVIDER)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn query_on(
    conn: SharedSqliteConnection,
    held: Option<LockRelease>,
    query: &SqlQuery,
) -> Result<SqlResultSet, AdapterError> {
    let sql_owned = query.sql.clone();
    let params_owned = map_args(query);
    run_blocking(conn, held, move |guard| {
        let mut stmt = guard
            .prepare(&sql_owned)
            .map_err(AdapterError::SqliteError)?;
        build_result_set(&mut stmt, &params_owned)
    })
    .await
}

pub(crate) async fn execute_on(
    conn: SharedSqliteConnection,
    held: Option<LockRelease>,
    query: &SqlQuery,
) -> Result<usize, AdapterError> {
    let sql_owned = query.sql.clone();
    let params_owned = map_args(query);
    run_blocking(conn, held, move |guard| {
        let mut stmt = guard
            .prepare_cached(&sql_owned)
            .map_err(AdapterError::SqliteError)?;
        stmt.execute(rusqlite::params_from_iter(params_owned.iter()))
            .map_err(AdapterError::SqliteError)
    })
    .await
}

/// Run synchronous engine work on the blocking pool.
///
/// `held` is the caller's lock capability, or `None` when the caller already owns the engine
/// through an open transaction. It is dropped on the blocking thread once the engine call has
/// returned, never earlier.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    held: Option<LockRelease>,
    func: F,
) -> Result<R, AdapterError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, AdapterError> + Send + 'static,
    R: Send + 'static,
{
    run_blocking_raw(conn, held, move |slot| match slot.as_mut() {
        Some(conn) => func(conn),
        None => Err(AdapterError::Disposed),
    })
    .await
}

async fn run_blocking_raw<F, R>(
    conn: SharedSqliteConnection,
    held: Option<LockRelease>,
    func: F,
) -> Result<R, AdapterError>
where
    F: FnOnce(&mut Option<rusqlite::Connection>) -> Result<R, AdapterError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = lock_slot(&conn).and_then(|mut guard| func(&mut *guard));
        drop(held);
        result
    })
    .await
    .map_err(|e| join_error("spawn_blocking", &e))?
}

fn join_error(what: &str, err: &tokio::task::JoinError) -> AdapterError {
    AdapterError::ConnectionError(format!("sqlite {what} join error: {err}"))
}

pub(crate) fn lock_slot(
    conn: &SharedSqliteConnection,
) -> Result<std::sync::MutexGuard<'_, Option<rusqlite::Connection>>, AdapterError> {
    conn.lock()
        .map_err(|_| AdapterError::ConnectionError("sqlite connection mutex poisoned".into()))
}
