use lru::LruCache;

use crate::error::{DbError, DbResult};
use crate::file::PageId;
use crate::lock::TransactionId;
use crate::record::PageRef;

/// Cached pages in recency order, bounded by `capacity`.
///
/// The underlying `LruCache` is unbounded: it must never push out a page by
/// itself, since only clean pages may leave the cache.
pub struct PageCache {
    pages: LruCache<PageId, PageRef>,
    capacity: usize,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: LruCache::unbounded(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains(&page_id)
    }

    /// Look up a page and mark it most recently used
    pub fn get(&mut self, page_id: PageId) -> Option<PageRef> {
        self.pages.get(&page_id).cloned()
    }

    /// Look up a page without touching recency
    pub fn peek(&self, page_id: PageId) -> Option<PageRef> {
        self.pages.peek(&page_id).cloned()
    }

    /// Cache a page as most recently used, evicting a clean page first when
    /// the cache is full.
    pub fn insert(&mut self, page_id: PageId, page: PageRef) -> DbResult<()> {
        if !self.pages.contains(&page_id) {
            while self.pages.len() >= self.capacity {
                self.evict()?;
            }
        }
        self.pages.put(page_id, page);
        Ok(())
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<PageRef> {
        self.pages.pop(&page_id)
    }

    /// Drop the least recently used clean page.
    ///
    /// A page whose lock is currently held for writing is being modified and
    /// counts as dirty.
    pub fn evict(&mut self) -> DbResult<PageId> {
        let victim = self
            .pages
            .iter()
            .rev()
            .find(|(_, page)| page.try_read().is_some_and(|p| p.is_dirty().is_none()))
            .map(|(page_id, _)| *page_id);

        match victim {
            Some(page_id) => {
                self.pages.pop(&page_id);
                log::debug!("evicted page {}", page_id);
                Ok(page_id)
            }
            None => Err(DbError::NoEvictablePage),
        }
    }

    /// Page ids from most to least recently used
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|(page_id, _)| *page_id).collect()
    }

    /// Every cached page currently dirtied by `tid`
    pub fn dirtied_by(&self, tid: TransactionId) -> Vec<(PageId, PageRef)> {
        self.pages
            .iter()
            .filter(|(_, page)| page.read().is_dirty() == Some(tid))
            .map(|(page_id, page)| (*page_id, page.clone()))
            .collect()
    }

    /// Every cached page that is dirty
    pub fn dirty_pages(&self) -> Vec<(PageId, PageRef)> {
        self.pages
            .iter()
            .filter(|(_, page)| page.read().is_dirty().is_some())
            .map(|(page_id, page)| (*page_id, page.clone()))
            .collect()
    }
}
