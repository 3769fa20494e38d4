use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::page_cache::PageCache;
use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::{DbError, DbResult};
use crate::file::{PageId, TableId};
use crate::lock::{LockManager, Permission, TransactionId};
use crate::record::{HeapFile, PageRef, RecordError, Tuple};
use crate::wal::LogFile;

/// Caches pages in memory and mediates every page access by a transaction.
///
/// Each request first takes the page lock matching its permission, so
/// transactions follow strict two-phase locking: locks are only given back in
/// `transaction_complete`. Dirty pages stay cached until their transaction
/// commits (flushed) or aborts (reloaded from disk).
///
/// Lock order: the cache mutex is taken before any page lock, and never
/// while a page guard is held.
pub struct BufferPool {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogFile>,
    locks: LockManager,
    cache: Mutex<PageCache>,
}

impl BufferPool {
    pub fn new(
        config: StorageConfig,
        catalog: Arc<Catalog>,
        log: Arc<dyn LogFile>,
    ) -> DbResult<Self> {
        config.validate()?;
        let cache = PageCache::new(config.pool_capacity);
        let pool = Self {
            config,
            catalog,
            log,
            locks: LockManager::new(),
            cache: Mutex::new(cache),
        };
        for table_id in pool.catalog.table_ids() {
            pool.table_file(table_id)?;
        }
        Ok(pool)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // Resolve a table, refusing files laid out with another page size
    fn table_file(&self, table_id: TableId) -> DbResult<Arc<HeapFile>> {
        let file = self.catalog.database_file(table_id)?;
        if file.page_size() != self.config.page_size {
            return Err(DbError::PageSizeMismatch {
                table_id,
                expected: self.config.page_size,
                actual: file.page_size(),
            });
        }
        Ok(file)
    }

    /// Fetch a page on behalf of `tid`, blocking until the lock for `perm` is
    /// granted.
    ///
    /// The wait is bounded by a random deadline in `[0, lock_wait_max]`; when
    /// it passes, the transaction is presumed deadlocked and the call fails
    /// with `TransactionAborted`.
    pub fn get_page(&self, tid: TransactionId, page_id: PageId, perm: Permission) -> DbResult<PageRef> {
        self.lock_page(tid, page_id, perm)?;

        if let Some(page) = self.cache.lock().get(page_id) {
            return Ok(page);
        }

        // Miss: read outside the cache mutex, then check again before caching
        let file = self.table_file(page_id.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(page_id)?));

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(page_id) {
            return Ok(cached);
        }
        cache.insert(page_id, page.clone())?;
        log::debug!("loaded page {} for {}", page_id, tid);
        Ok(page)
    }

    fn lock_page(&self, tid: TransactionId, page_id: PageId, perm: Permission) -> DbResult<()> {
        let max_wait = self.config.lock_wait_max_ms;
        let wait = rand::rng().random_range(0..=max_wait);
        let deadline = Instant::now() + Duration::from_millis(wait);

        if self
            .locks
            .acquire_until(tid, page_id, perm.lock_mode(), deadline)
        {
            return Ok(());
        }

        log::warn!(
            "{} gave up waiting {}ms for {:?} lock on page {}",
            tid,
            wait,
            perm.lock_mode(),
            page_id
        );
        Err(DbError::TransactionAborted { tid, page_id })
    }

    /// Give back the lock `tid` holds on `page_id` before the transaction
    /// ends. This breaks two-phase locking and is only safe for pages the
    /// transaction neither read nor modified.
    pub fn unsafe_release_page(&self, tid: TransactionId, page_id: PageId) {
        self.locks.release(tid, page_id);
    }

    /// Whether `tid` holds a lock on `page_id`
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks.holds(tid, page_id)
    }

    /// Add `tuple` to the table on behalf of `tid`. The tuple's record id is
    /// set to where it landed.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &mut Tuple) -> DbResult<()> {
        let file = self.table_file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.absorb_dirty(tid, pages)
    }

    /// Remove `tuple` from its table on behalf of `tid`
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> DbResult<()> {
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        let file = self.table_file(rid.page_id.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.absorb_dirty(tid, pages)
    }

    // Mark the pages dirty for `tid` and make sure they are cached
    fn absorb_dirty(&self, tid: TransactionId, pages: Vec<PageRef>) -> DbResult<()> {
        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(true, tid);
                guard.id()
            };
            self.cache.lock().insert(page_id, page)?;
        }
        Ok(())
    }

    /// End `tid`. A commit makes its pages durable; an abort restores their
    /// on-disk state. Either way every lock of `tid` is released. Calling it
    /// again for a finished transaction does nothing.
    ///
    /// Pages a failed commit could not write are dropped from the cache, so
    /// later readers see what is on disk.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        if commit {
            if let Err(err) = self.flush_pages(tid) {
                log::error!("commit of {} failed to flush: {}", tid, err);
                self.discard_dirtied(tid);
            }
        } else {
            self.rollback(tid);
        }
        self.locks.release_all(tid);
        log::debug!("{} {}", tid, if commit { "committed" } else { "aborted" });
    }

    fn rollback(&self, tid: TransactionId) {
        let dirtied = self.cache.lock().dirtied_by(tid);
        for (page_id, _) in dirtied {
            self.cache.lock().remove(page_id);
            // The lock is still held, so this only rereads the page from disk
            if let Err(err) = self.get_page(tid, page_id, Permission::ReadOnly) {
                log::error!("{} could not reload page {}: {}", tid, page_id, err);
            }
        }
    }

    fn discard_dirtied(&self, tid: TransactionId) {
        let mut cache = self.cache.lock();
        for (page_id, _) in cache.dirtied_by(tid) {
            cache.remove(page_id);
            log::warn!("discarded unflushed page {} of {}", page_id, tid);
        }
    }

    /// Drop a page from the cache without writing it
    pub fn discard_page(&self, page_id: PageId) {
        self.cache.lock().remove(page_id);
    }

    /// Write every page dirtied by `tid`. All pages are attempted; the first
    /// failure is returned.
    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        let dirtied = self.cache.lock().dirtied_by(tid);
        Self::first_error(dirtied.iter().map(|(_, page)| self.write_dirty(page)))
    }

    /// Write every dirty page in the cache
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let dirty = self.cache.lock().dirty_pages();
        Self::first_error(dirty.iter().map(|(_, page)| self.write_dirty(page)))
    }

    /// Write one cached page if it is dirty
    pub fn flush_page(&self, page_id: PageId) -> DbResult<()> {
        let page = self.cache.lock().peek(page_id);
        match page {
            Some(page) => self.write_dirty(&page),
            None => Ok(()),
        }
    }

    fn first_error(results: impl Iterator<Item = DbResult<()>>) -> DbResult<()> {
        let mut first = Ok(());
        for result in results {
            if let Err(err) = result {
                log::error!("page flush failed: {}", err);
                if first.is_ok() {
                    first = Err(err);
                }
            }
        }
        first
    }

    // Log the update, force the log, then write the page and mark it clean.
    // The page only turns clean once it is on disk.
    fn write_dirty(&self, page: &PageRef) -> DbResult<()> {
        let mut guard = page.write();
        let Some(dirtier) = guard.is_dirty() else {
            return Ok(());
        };
        let page_id = guard.id();
        let file = self.table_file(page_id.table_id)?;

        self.log
            .log_write(dirtier, page_id, &guard.before_image(), guard.page_data())
            .map_err(DbError::Log)?;
        self.log.force().map_err(DbError::Log)?;
        file.write_page(&guard)?;

        guard.mark_dirty(false, dirtier);
        guard.set_before_image();
        log::debug!("flushed page {} for {}", page_id, dirtier);
        Ok(())
    }

    /// Ids of the cached pages, most recently used first
    pub fn cached_pages(&self) -> Vec<PageId> {
        self.cache.lock().page_ids()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().contains(page_id)
    }

    /// Maximum number of cached pages
    pub fn capacity(&self) -> usize {
        self.cache.lock().capacity()
    }
}
