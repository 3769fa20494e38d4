mod error;
mod paged_file;

pub use error::{FileError, FileResult};
pub use paged_file::PagedFile;

use std::fmt;

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages held by the buffer pool
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// Table identifier
pub type TableId = u32;

/// Location of a page: owning table plus page number within its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: usize) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_number)
    }
}
