use thiserror::Error;

use crate::types::IsolationLevel;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid isolation level: {0:?}; SQLite only supports Serializable")]
    InvalidIsolationLevel(IsolationLevel),

    #[error("Transaction already completed")]
    TransactionClosed,

    #[error("Adapter has been disposed")]
    Disposed,

    #[error("Connection error: {0}")]
    ConnectionError(String),
}
