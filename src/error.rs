use std::io;
use thiserror::Error;

use crate::file::{FileError, PageId, TableId};
use crate::lock::TransactionId;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum DbError {
    /// The lock could not be acquired before the wait deadline. The
    /// transaction must abort; retrying the request is not an option.
    #[error("Transaction {tid} aborted waiting for a lock on page {page_id}")]
    TransactionAborted { tid: TransactionId, page_id: PageId },

    /// Every cached page is dirty, so nothing can be evicted
    #[error("No clean page to evict from the buffer pool")]
    NoEvictablePage,

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Table {table_id} uses {actual}-byte pages, the pool expects {expected}")]
    PageSizeMismatch {
        table_id: TableId,
        expected: usize,
        actual: usize,
    },

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Log error: {0}")]
    Log(io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the error means the calling transaction must abort
    pub fn is_abort(&self) -> bool {
        matches!(self, DbError::TransactionAborted { .. })
    }
}

pub type DbResult<T> = Result<T, DbError>;
