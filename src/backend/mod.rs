//! Seams between the engine and a concrete database.
//!
//! The coordinator only needs a transactional connection that can run one
//! statement at a time; the edit session additionally needs a page loader.

pub mod postgres;
pub mod sqlite;

use crate::catalog::{PageRequest, TablePage, TableRef};
use crate::error::BatchError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The connection could not be opened or went away.
    #[error("{0}")]
    Connection(String),
    /// The database rejected a statement.
    #[error("{0}")]
    Statement(String),
}

/// One database connection able to run a single transaction at a time.
#[async_trait]
pub trait BatchConnection: Send {
    async fn begin(&mut self) -> Result<(), BackendError>;

    /// Runs one statement and returns the number of rows it affected.
    async fn execute(&mut self, sql: &str) -> Result<u64, BackendError>;

    async fn commit(&mut self) -> Result<(), BackendError>;

    async fn rollback(&mut self) -> Result<(), BackendError>;
}

/// Hands out a connection scoped to one batch against `table`.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    type Connection: BatchConnection;

    async fn acquire(&self, table: &TableRef) -> Result<Self::Connection, BackendError>;
}

/// The page loader contract: column metadata, one page of rows ordered by
/// primary key, and the table's total row count.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load_page(&self, request: &PageRequest) -> Result<TablePage, BatchError>;
}

/// A database usable by an edit session end to end.
pub trait Backend: ConnectionSource + PageLoader {}

impl<T: ConnectionSource + PageLoader> Backend for T {}

pub(crate) fn page_offset(request: &PageRequest) -> Result<i64, BatchError> {
    i64::try_from(request.offset())
        .map_err(|_| BatchError::validation(format!("page {} is out of range", request.page)))
}
