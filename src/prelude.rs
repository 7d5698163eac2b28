//! Convenient imports for common functionality.

pub use crate::driver::{DriverAdapter, Queryable, Transaction};
pub use crate::error::AdapterError;
pub use crate::lock::{AsyncExclusiveLock, LockRelease};
pub use crate::sqlite::{
    AdapterFactory, AdapterOptions, AdapterOptionsBuilder, ConnectionAdapter, DatabaseTarget,
    TransactionHandle,
};
pub use crate::types::{
    ColumnType, ConnectionInfo, IsolationLevel, QueryArg, ScalarType, SqlQuery, SqlResultSet,
    SqlValue, TransactionOptions,
};
