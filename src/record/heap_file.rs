use std::path::Path;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::page::{HeapPage, PageRef};
use super::schema::TupleDesc;
use super::tuple::Tuple;
use crate::buffer::BufferPool;
use crate::error::DbResult;
use crate::file::{PageId, PagedFile, TableId};
use crate::lock::{Permission, TransactionId};

/// An unordered collection of tuples stored in fixed-size pages.
///
/// The table id is derived from the file's canonical path, so reopening the
/// same file always yields the same id.
pub struct HeapFile {
    file: PagedFile,
    desc: Arc<TupleDesc>,
    table_id: TableId,
}

impl HeapFile {
    /// Create a new, empty heap file
    pub fn create<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        page_size: usize,
    ) -> RecordResult<Self> {
        Self::check_layout(&desc, page_size)?;
        let file = PagedFile::create(path, page_size)?;
        Ok(Self::from_paged(file, desc))
    }

    /// Open an existing heap file
    pub fn open<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        page_size: usize,
    ) -> RecordResult<Self> {
        Self::check_layout(&desc, page_size)?;
        let file = PagedFile::open(path, page_size)?;
        Ok(Self::from_paged(file, desc))
    }

    /// Open the heap file, creating an empty one if it does not exist
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        page_size: usize,
    ) -> RecordResult<Self> {
        Self::check_layout(&desc, page_size)?;
        let file = PagedFile::open_or_create(path, page_size)?;
        Ok(Self::from_paged(file, desc))
    }

    fn check_layout(desc: &TupleDesc, page_size: usize) -> RecordResult<()> {
        if desc.num_fields() == 0 {
            return Err(RecordError::EmptySchema);
        }
        if HeapPage::slots_per_page(page_size, desc.tuple_size()) == 0 {
            return Err(RecordError::TupleTooLarge {
                tuple_size: desc.tuple_size(),
                page_size,
            });
        }
        Ok(())
    }

    fn from_paged(file: PagedFile, desc: Arc<TupleDesc>) -> Self {
        let table_id = crc32fast::hash(file.path().to_string_lossy().as_bytes());
        Self {
            file,
            desc,
            table_id,
        }
    }

    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Number of pages currently in the file
    pub fn num_pages(&self) -> RecordResult<usize> {
        Ok(self.file.num_pages()?)
    }

    fn check_table(&self, page_id: PageId) -> RecordResult<()> {
        if page_id.table_id != self.table_id {
            return Err(RecordError::WrongTable {
                expected: self.table_id,
                actual: page_id.table_id,
            });
        }
        Ok(())
    }

    /// Read a page straight from disk, bypassing any cache
    pub fn read_page(&self, page_id: PageId) -> RecordResult<HeapPage> {
        self.check_table(page_id)?;
        let mut data = vec![0u8; self.file.page_size()];
        self.file.read_page(page_id.page_number, &mut data)?;
        HeapPage::new(page_id, data, self.desc.clone())
    }

    /// Overwrite the page's slot on disk. Writing one past the end appends.
    pub fn write_page(&self, page: &HeapPage) -> RecordResult<()> {
        self.check_table(page.id())?;
        self.file.write_page(page.id().page_number, page.page_data())?;
        Ok(())
    }

    /// Flush OS buffers for the backing file
    pub fn sync(&self) -> RecordResult<()> {
        Ok(self.file.sync()?)
    }

    /// Place `tuple` on the first page with a free slot, appending a page
    /// when every page is full. Returns the single page it dirtied.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> DbResult<Vec<PageRef>> {
        if tuple.tuple_desc().as_ref() != self.desc.as_ref() {
            return Err(RecordError::SchemaMismatch(
                "Tuple schema does not match the heap file".to_string(),
            )
            .into());
        }

        let mut scanned = 0;
        loop {
            let num_pages = self.num_pages()?;
            for page_number in scanned..num_pages {
                let page_id = PageId::new(self.table_id, page_number);
                if let Some(page) = self.try_insert(pool, tid, page_id, tuple)? {
                    return Ok(vec![page]);
                }
            }
            scanned = num_pages;

            // Every page is full. Grow the file by one empty page, then fill
            // it through the pool so it is locked like any other page.
            let empty = vec![0u8; self.file.page_size()];
            let page_number = self.file.append_page(&empty)?;
            log::debug!("table {} grew to {} pages", self.table_id, page_number + 1);

            // The page is unlocked until fetched, so a concurrent insert may
            // have taken its slots. Pages appended meanwhile are rescanned.
            let page_id = PageId::new(self.table_id, page_number);
            if let Some(page) = self.try_insert(pool, tid, page_id, tuple)? {
                return Ok(vec![page]);
            }
            log::debug!("appended page {} was filled by another transaction", page_id);
        }
    }

    // Insert into `page_id` if it has a free slot. A full page is released
    // again unless the transaction held it before.
    fn try_insert(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        tuple: &mut Tuple,
    ) -> DbResult<Option<PageRef>> {
        let held_before = pool.holds_lock(tid, page_id);
        let page = pool.get_page(tid, page_id, Permission::ReadWrite)?;

        let mut guard = page.write();
        if guard.first_free_slot().is_some() {
            guard.insert_tuple(tid, tuple)?;
            drop(guard);
            return Ok(Some(page));
        }
        drop(guard);

        if !held_before {
            pool.unsafe_release_page(tid, page_id);
        }
        Ok(None)
    }

    /// Free the slot `tuple` occupies. Returns the single page it dirtied.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> DbResult<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        self.check_table(rid.page_id)?;

        let page = pool.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        page.write().delete_tuple(tid, tuple)?;
        Ok(vec![page])
    }

    /// A read-only scan over every tuple for `tid`. Call `open` first.
    pub fn iterator<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, pool, tid, Permission::ReadOnly)
    }

    /// A scan that fetches pages with an explicit permission
    pub fn iterator_with<'a>(
        &'a self,
        pool: &'a BufferPool,
        tid: TransactionId,
        permission: Permission,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, pool, tid, permission)
    }
}

/// Forward-only, restartable scan over a heap file, one page at a time.
///
/// Pages are requested through the buffer pool, so a scan takes a lock on
/// every page it visits and keeps it until the transaction completes.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    permission: Permission,
    page_number: usize,
    current: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> HeapFileIterator<'a> {
    fn new(
        file: &'a HeapFile,
        pool: &'a BufferPool,
        tid: TransactionId,
        permission: Permission,
    ) -> Self {
        Self {
            file,
            pool,
            tid,
            permission,
            page_number: 0,
            current: None,
        }
    }

    fn load_page(&self, page_number: usize) -> DbResult<std::vec::IntoIter<Tuple>> {
        let page_id = PageId::new(self.file.id(), page_number);
        let page = self.pool.get_page(self.tid, page_id, self.permission)?;
        let tuples = page.read().tuples()?;
        Ok(tuples.into_iter())
    }

    /// Position the scan on page 0
    pub fn open(&mut self) -> DbResult<()> {
        self.page_number = 0;
        self.current = if self.file.num_pages()? == 0 {
            Some(Vec::new().into_iter())
        } else {
            Some(self.load_page(0)?)
        };
        Ok(())
    }

    /// Whether another tuple is available, advancing across pages as needed.
    /// Always false on a closed iterator.
    pub fn has_next(&mut self) -> DbResult<bool> {
        loop {
            let Some(current) = self.current.as_ref() else {
                return Ok(false);
            };
            if current.len() > 0 {
                return Ok(true);
            }

            if self.page_number + 1 >= self.file.num_pages()? {
                return Ok(false);
            }
            self.page_number += 1;
            self.current = Some(self.load_page(self.page_number)?);
        }
    }

    /// Restart from page 0
    pub fn rewind(&mut self) -> DbResult<()> {
        self.open()
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => self.current.as_mut().and_then(Iterator::next).map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
