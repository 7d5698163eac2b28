//! Async driver adapter over a single embedded SQLite connection.
//!
//! One [`ConnectionAdapter`] owns one `rusqlite` connection. Every operation takes the
//! adapter's FIFO [`AsyncExclusiveLock`], so any number of concurrent callers see one linear
//! history; a [`TransactionHandle`] keeps that lock from `BEGIN` until commit or rollback.
//!
//! ```rust,no_run
//! use embedded_sql_adapter::prelude::*;
//!
//! # async fn run() -> Result<(), AdapterError> {
//! let factory = AdapterFactory::new("file:./dev.db")?;
//! let adapter = factory.connect().await?;
//! adapter
//!     .execute_script("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, name TEXT);")
//!     .await?;
//!
//! let tx = adapter.start_transaction(None).await?;
//! tx.execute_raw(&SqlQuery::new("INSERT INTO t (name) VALUES (?)").arg(SqlValue::Text("a".into())))
//!     .await?;
//! tx.commit().await?;
//!
//! let rs = adapter.query_raw(&SqlQuery::new("SELECT id, name FROM t")).await?;
//! assert_eq!(rs.column_types, vec![ColumnType::Int32, ColumnType::Text]);
//! adapter.dispose().await?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod lock;
pub mod prelude;
pub mod sqlite;
pub mod types;

pub use driver::{DriverAdapter, Queryable, Transaction};
pub use error::AdapterError;
pub use lock::{AsyncExclusiveLock, LockRelease};
pub use sqlite::{AdapterFactory, AdapterOptions, ConnectionAdapter, TransactionHandle};
pub use types::{
    ColumnType, ConnectionInfo, IsolationLevel, QueryArg, ScalarType, SqlQuery, SqlResultSet,
    SqlValue, TransactionOptions,
};
