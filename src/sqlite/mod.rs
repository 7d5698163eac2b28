// SQLite module - the driver adapter over a single rusqlite connection
//
// - column_types: declared-type classification and row-based inference
// - query: result materialization and value marshalling
// - params: argument encoding into engine-native values
// - config: connection strings, options, and the adapter factory
// - connection: the adapter itself
// - transaction: lock-holding BEGIN..COMMIT/ROLLBACK scopes

pub mod column_types;
pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod transaction;

// Re-export the public API
pub use column_types::{map_declared_type, resolve_column_types};
pub use config::{AdapterFactory, AdapterOptions, AdapterOptionsBuilder, DatabaseTarget};
pub use connection::{ADAPTER_NAME, ConnectionAdapter, PROVIDER};
pub use params::map_args;
pub use query::{build_result_set, map_row};
pub use transaction::TransactionHandle;
