use async_trait::async_trait;

use crate::error::AdapterError;
use crate::sqlite::{ADAPTER_NAME, ConnectionAdapter, PROVIDER, TransactionHandle};
use crate::types::{
    ConnectionInfo, IsolationLevel, SqlQuery, SqlResultSet, TransactionOptions,
};

/// Operations shared by adapters and open transactions.
#[async_trait]
pub trait Queryable: Send + Sync {
    fn provider(&self) -> &'static str;

    fn adapter_name(&self) -> &'static str;

    /// Runs a query and returns the materialized result set.
    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, AdapterError>;

    /// Runs a statement and returns the number of rows it changed.
    async fn execute_raw(&self, query: &SqlQuery) -> Result<usize, AdapterError>;
}

/// The surface the ORM layer drives: one adapter per connection.
#[async_trait]
pub trait DriverAdapter: Queryable {
    /// Runs a parameterless multi-statement script.
    async fn execute_script(&self, script: &str) -> Result<(), AdapterError>;

    async fn start_transaction(
        &self,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<Box<dyn Transaction>, AdapterError>;

    fn connection_info(&self) -> ConnectionInfo;

    async fn dispose(&self) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait Transaction: Queryable {
    fn options(&self) -> TransactionOptions;

    async fn commit(self: Box<Self>) -> Result<(), AdapterError>;

    async fn rollback(self: Box<Self>) -> Result<(), AdapterError>;
}

#[async_trait]
impl Queryable for ConnectionAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn adapter_name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, AdapterError> {
        ConnectionAdapter::query_raw(self, query).await
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<usize, AdapterError> {
        ConnectionAdapter::execute_raw(self, query).await
    }
}

#[async_trait]
impl DriverAdapter for ConnectionAdapter {
    async fn execute_script(&self, script: &str) -> Result<(), AdapterError> {
        ConnectionAdapter::execute_script(self, script).await
    }

    async fn start_transaction(
        &self,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<Box<dyn Transaction>, AdapterError> {
        let tx = ConnectionAdapter::start_transaction(self, isolation_level).await?;
        Ok(Box::new(tx))
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionAdapter::connection_info(self)
    }

    async fn dispose(&self) -> Result<(), AdapterError> {
        ConnectionAdapter::dispose(self).await
    }
}

#[async_trait]
impl Queryable for TransactionHandle {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn adapter_name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet, AdapterError> {
        TransactionHandle::query_raw(self, query).await
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<usize, AdapterError> {
        TransactionHandle::execute_raw(self, query).await
    }
}

#[async_trait]
impl Transaction for TransactionHandle {
    fn options(&self) -> TransactionOptions {
        TransactionHandle::options(self)
    }

    async fn commit(self: Box<Self>) -> Result<(), AdapterError> {
        TransactionHandle::commit(*self).await
    }

    async fn rollback(self: Box<Self>) -> Result<(), AdapterError> {
        TransactionHandle::rollback(*self).await
    }
}
