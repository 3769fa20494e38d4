pub mod buffer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod file;
pub mod lock;
pub mod record;
pub mod wal;

pub use buffer::{BufferPool, PageCache};
pub use catalog::Catalog;
pub use config::StorageConfig;
pub use error::{DbError, DbResult};
pub use file::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_CAPACITY, FileError, FileResult, PageId, PagedFile, TableId};
pub use lock::{LockManager, LockMode, Permission, TransactionId};
pub use record::{
    ColumnDef, DataType, Field, HeapFile, HeapFileIterator, HeapPage, PageRef, RecordError,
    RecordId, RecordResult, Tuple, TupleDesc,
};
pub use wal::{LogFile, UpdateRecord, WriteAheadLog};
