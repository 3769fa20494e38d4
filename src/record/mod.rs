//! Tuples, slotted heap pages and the heap files that hold them.

mod error;
mod heap_file;
mod page;
mod schema;
mod tuple;
mod value;

pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use page::{HeapPage, PageRef};
pub use schema::{ColumnDef, TupleDesc};
pub use tuple::{RecordId, Tuple};
pub use value::{DataType, Field};
