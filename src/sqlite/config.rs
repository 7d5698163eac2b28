use std::path::{Path, PathBuf};

use crate::error::AdapterError;

use super::connection::ConnectionAdapter;

/// Environment variable read by [`AdapterFactory::from_env`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const FILE_PREFIX: &str = "file:";
const MEMORY_PATH: &str = ":memory:";

/// Options for constructing a SQLite adapter.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub url: String,
    /// Directory relative `file:` paths are resolved against; defaults to the working directory.
    pub base_dir: Option<PathBuf>,
}

impl AdapterOptions {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            base_dir: None,
        }
    }

    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    #[must_use]
    pub fn builder(url: impl Into<String>) -> AdapterOptionsBuilder {
        AdapterOptionsBuilder::new(url)
    }
}

/// Fluent builder for adapter options.
#[derive(Debug, Clone)]
pub struct AdapterOptionsBuilder {
    opts: AdapterOptions,
}

impl AdapterOptionsBuilder {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            opts: AdapterOptions::new(url),
        }
    }

    #[must_use]
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.opts.base_dir = Some(base_dir.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> AdapterOptions {
        self.opts
    }

    /// Build an [`AdapterFactory`] from these options.
    ///
    /// # Errors
    /// Returns `AdapterError::ConfigError` if the connection string is missing or malformed.
    pub fn build(self) -> Result<AdapterFactory, AdapterError> {
        AdapterFactory::with_options(self.finish())
    }
}

/// Where a connection string points once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
    /// Not a `file:` url. Recognised so callers can inspect it, but [`AdapterFactory::connect`]
    /// refuses it.
    Unresolved(String),
}

/// Produces one [`ConnectionAdapter`] per [`AdapterFactory::connect`] call.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    url: String,
    target: DatabaseTarget,
}

impl AdapterFactory {
    /// Factory for `url`, resolving relative paths against the current directory.
    ///
    /// # Errors
    /// Returns `AdapterError::ConfigError` if the connection string is missing or malformed.
    pub fn new(url: impl Into<String>) -> Result<Self, AdapterError> {
        Self::with_options(AdapterOptions::new(url))
    }

    /// Factory for the url in `DATABASE_URL`.
    ///
    /// # Errors
    /// Returns `AdapterError::ConfigError` if the variable is unset or its value is malformed.
    pub fn from_env() -> Result<Self, AdapterError> {
        let url = std::env::var(DATABASE_URL_ENV).map_err(|e| {
            AdapterError::ConfigError(format!("{DATABASE_URL_ENV} is not usable: {e}"))
        })?;
        Self::new(url)
    }

    /// # Errors
    /// Returns `AdapterError::ConfigError` if the connection string is missing or malformed.
    pub fn with_options(opts: AdapterOptions) -> Result<Self, AdapterError> {
        let base_dir = match opts.base_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| {
                AdapterError::ConfigError(format!("cannot determine current directory: {e}"))
            })?,
        };
        let target = resolve_url(&opts.url, &base_dir)?;
        Ok(Self {
            url: opts.url,
            target,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Open a fresh connection and wrap it in its own adapter.
    ///
    /// Foreign-key enforcement is always switched on.
    ///
    /// # Errors
    /// Returns `AdapterError::ConfigError` for a connection string that is not a `file:` url,
    /// or `AdapterError::SqliteError` if the database cannot be opened or configured.
    pub async fn connect(&self) -> Result<ConnectionAdapter, AdapterError> {
        if let DatabaseTarget::Unresolved(url) = &self.target {
            return Err(AdapterError::ConfigError(format!(
                "unsupported connection string (expected file:<path>): {url}"
            )));
        }
        let target = self.target.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&target))
            .await
            .map_err(|e| {
                AdapterError::ConnectionError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
        Ok(ConnectionAdapter::new(conn))
    }
}

/// Resolve a connection string against `base_dir`.
///
/// # Errors
/// Returns `AdapterError::ConfigError` for a blank string or a `file:` url without a path.
pub fn resolve_url(url: &str, base_dir: &Path) -> Result<DatabaseTarget, AdapterError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AdapterError::ConfigError(
            "connection string is empty".into(),
        ));
    }
    let Some(rest) = url.strip_prefix(FILE_PREFIX) else {
        return Ok(DatabaseTarget::Unresolved(url.to_owned()));
    };
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);
    if path.is_empty() {
        return Err(AdapterError::ConfigError(format!(
            "connection string has no file path: {url}"
        )));
    }
    if path == MEMORY_PATH {
        return Ok(DatabaseTarget::Memory);
    }
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(DatabaseTarget::File(path.to_path_buf()))
    } else {
        Ok(DatabaseTarget::File(base_dir.join(path)))
    }
}

fn open_connection(target: &DatabaseTarget) -> Result<rusqlite::Connection, AdapterError> {
    let conn = match target {
        DatabaseTarget::File(path) => {
            tracing::debug!(path = %path.display(), "opening sqlite database");
            rusqlite::Connection::open(path)?
        }
        DatabaseTarget::Memory => {
            tracing::debug!("opening in-memory sqlite database");
            rusqlite::Connection::open_in_memory()?
        }
        DatabaseTarget::Unresolved(url) => {
            return Err(AdapterError::ConfigError(format!(
                "unsupported connection string (expected file:<path>): {url}"
            )));
        }
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}
