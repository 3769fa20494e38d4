use crate::file::{FileError, PageId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Schema must have at least one field")]
    EmptySchema,

    #[error("Field index {index} out of range for {len} fields")]
    FieldIndexOutOfRange { index: usize, len: usize },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Slot not occupied: page={0}, slot={1}")]
    SlotNotOccupied(PageId, usize),

    #[error("Invalid slot: page={0}, slot={1}")]
    InvalidSlot(PageId, usize),

    #[error("Page full: page={0}")]
    PageFull(PageId),

    #[error("Tuple is too large for page: tuple_size={tuple_size}, page_size={page_size}")]
    TupleTooLarge { tuple_size: usize, page_size: usize },

    #[error("Tuple belongs to table {actual}, not {expected}")]
    WrongTable { expected: u32, actual: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

pub type RecordResult<T> = Result<T, RecordError>;
