//! The buffer pool: page cache, lock mediation and transaction completion.

mod page_cache;
mod pool;

#[cfg(test)]
mod tests;

pub use page_cache::PageCache;
pub use pool::BufferPool;
