use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("File length {len} is not a multiple of page size {page_size}")]
    MisalignedFile { len: u64, page_size: usize },

    #[error("Page {page_number} out of range: file has {num_pages} pages")]
    PageOutOfRange {
        page_number: usize,
        num_pages: usize,
    },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

pub type FileResult<T> = Result<T, FileError>;
