use super::*;
use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::DbError;
use crate::file::PageId;
use crate::lock::{Permission, TransactionId};
use crate::record::{ColumnDef, DataType, Field, HeapFile, HeapPage, Tuple, TupleDesc};
use crate::wal::{LogFile, WriteAheadLog};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// Two ints: 1 null-bitmap byte + 8 bytes per tuple, so a 64-byte page holds
// floor(512 / 73) = 7 tuples
const PAGE_SIZE: usize = 64;
const SLOTS: usize = 7;

struct Fixture {
    _temp: TempDir,
    wal: Arc<WriteAheadLog>,
    file: Arc<HeapFile>,
    pool: BufferPool,
}

impl Fixture {
    fn table_id(&self) -> u32 {
        self.file.id()
    }

    fn page_id(&self, n: usize) -> PageId {
        PageId::new(self.file.id(), n)
    }

    fn tuple(&self, a: i32, b: i32) -> Tuple {
        Tuple::with_fields(desc(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    fn insert(&self, tid: TransactionId, a: i32) -> Tuple {
        let mut tuple = self.tuple(a, a * 10);
        self.pool
            .insert_tuple(tid, self.table_id(), &mut tuple)
            .unwrap();
        tuple
    }

    // Write `pages` pages straight to disk, each with `per_page` tuples
    fn prefill(&self, pages: usize, per_page: usize) {
        let tid = TransactionId::allocate();
        for n in 0..pages {
            let mut page = HeapPage::empty(self.page_id(n), desc(), PAGE_SIZE).unwrap();
            for i in 0..per_page {
                let mut tuple = self.tuple((n * 100 + i) as i32, 0);
                page.insert_tuple(tid, &mut tuple).unwrap();
            }
            self.file.write_page(&page).unwrap();
        }
    }

    fn scan(&self, tid: TransactionId) -> Vec<i32> {
        let mut iter = self.file.iterator(&self.pool, tid);
        iter.open().unwrap();
        let mut values: Vec<i32> = iter
            .map(|t| match t.unwrap().field(0).unwrap() {
                Field::Int(v) => *v,
                other => panic!("unexpected field {:?}", other),
            })
            .collect();
        values.sort();
        values
    }
}

fn desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::from_types(vec![DataType::Int, DataType::Int]))
}

/// A log device that rejects every write
struct FailingLog;

impl LogFile for FailingLog {
    fn log_write(
        &self,
        _tid: TransactionId,
        _page_id: PageId,
        _before: &[u8],
        _after: &[u8],
    ) -> io::Result<()> {
        Err(io::Error::other("log device unavailable"))
    }

    fn force(&self) -> io::Result<()> {
        Ok(())
    }
}

fn setup(capacity: usize, lock_wait: Duration) -> Fixture {
    setup_with(desc(), capacity, lock_wait, None)
}

// `log` replaces the fixture's write-ahead log as the pool's log device
fn setup_with(
    table_desc: Arc<TupleDesc>,
    capacity: usize,
    lock_wait: Duration,
    log: Option<Arc<dyn LogFile>>,
) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let temp = TempDir::new().unwrap();
    let file = Arc::new(
        HeapFile::create(temp.path().join("table.dat"), table_desc, PAGE_SIZE).unwrap(),
    );
    let wal = Arc::new(WriteAheadLog::open(temp.path().join("table.wal")).unwrap());

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(file.clone(), "table");

    let config = StorageConfig::default()
        .page_size(PAGE_SIZE)
        .pool_capacity(capacity)
        .lock_wait_max(lock_wait);
    let log: Arc<dyn LogFile> = match log {
        Some(log) => log,
        None => wal.clone(),
    };
    let pool = BufferPool::new(config, catalog, log).unwrap();

    Fixture {
        _temp: temp,
        wal,
        file,
        pool,
    }
}

fn default_setup() -> Fixture {
    setup(10, Duration::from_millis(100))
}

#[test]
fn test_rejects_zero_capacity() {
    let temp = TempDir::new().unwrap();
    let wal = Arc::new(WriteAheadLog::open(temp.path().join("x.wal")).unwrap());
    let config = StorageConfig::default().pool_capacity(0);
    let result = BufferPool::new(config, Arc::new(Catalog::new()), wal);
    assert!(matches!(result, Err(DbError::Config(_))));
}

#[test]
fn test_insert_and_scan() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    for i in 0..3 {
        let tuple = fx.insert(tid, i);
        assert_eq!(tuple.record_id().unwrap().page_id, fx.page_id(0));
    }

    assert_eq!(fx.scan(tid), vec![0, 1, 2]);
    fx.pool.transaction_complete(tid, true);

    let reader = TransactionId::allocate();
    assert_eq!(fx.scan(reader), vec![0, 1, 2]);
    fx.pool.transaction_complete(reader, true);
}

#[test]
fn test_scan_empty_file() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    assert!(fx.scan(tid).is_empty());

    let mut iter = fx.file.iterator(&fx.pool, tid);
    assert!(!iter.has_next().unwrap(), "unopened iterator yields nothing");
}

#[test]
fn test_iterator_rewind_and_close() {
    let fx = default_setup();
    fx.prefill(3, 2);
    let tid = TransactionId::allocate();

    let mut iter = fx.file.iterator(&fx.pool, tid);
    iter.open().unwrap();
    assert_eq!(iter.by_ref().count(), 6);
    assert!(!iter.has_next().unwrap());

    iter.rewind().unwrap();
    assert!(iter.has_next().unwrap());
    assert_eq!(iter.by_ref().count(), 6);

    iter.close();
    assert!(!iter.has_next().unwrap());
    assert!(iter.next().is_none());

    // The scan holds shared locks on every page it visited
    for n in 0..3 {
        assert!(fx.pool.holds_lock(tid, fx.page_id(n)));
    }
    fx.pool.transaction_complete(tid, true);
    for n in 0..3 {
        assert!(!fx.pool.holds_lock(tid, fx.page_id(n)));
    }
}

#[test]
fn test_iterator_skips_empty_pages() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    let mut page = HeapPage::empty(fx.page_id(0), desc(), PAGE_SIZE).unwrap();
    fx.file.write_page(&page).unwrap();
    let mut tuple = fx.tuple(42, 0);
    page = HeapPage::empty(fx.page_id(1), desc(), PAGE_SIZE).unwrap();
    page.insert_tuple(tid, &mut tuple).unwrap();
    fx.file.write_page(&page).unwrap();

    assert_eq!(fx.scan(tid), vec![42]);
}

#[test]
fn test_cache_never_exceeds_capacity() {
    let fx = setup(3, Duration::from_millis(100));
    fx.prefill(8, 1);
    let tid = TransactionId::allocate();

    for n in 0..8 {
        fx.pool
            .get_page(tid, fx.page_id(n), Permission::ReadOnly)
            .unwrap();
        assert!(fx.pool.cached_pages().len() <= fx.pool.capacity());
    }
    assert_eq!(fx.pool.cached_pages().len(), 3);
}

#[test]
fn test_lru_page_is_evicted() {
    let fx = setup(2, Duration::from_millis(100));
    fx.prefill(3, 1);
    let tid = TransactionId::allocate();

    for n in 0..3 {
        fx.pool
            .get_page(tid, fx.page_id(n), Permission::ReadOnly)
            .unwrap();
    }
    assert!(!fx.pool.is_cached(fx.page_id(0)));
    assert!(fx.pool.is_cached(fx.page_id(1)));
    assert!(fx.pool.is_cached(fx.page_id(2)));
}

#[test]
fn test_hit_refreshes_recency() {
    let fx = setup(2, Duration::from_millis(100));
    fx.prefill(3, 1);
    let tid = TransactionId::allocate();

    let first = fx
        .pool
        .get_page(tid, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    fx.pool
        .get_page(tid, fx.page_id(1), Permission::ReadOnly)
        .unwrap();
    let again = fx
        .pool
        .get_page(tid, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    fx.pool
        .get_page(tid, fx.page_id(2), Permission::ReadOnly)
        .unwrap();
    assert_eq!(fx.pool.cached_pages(), vec![fx.page_id(2), fx.page_id(0)]);
}

#[test]
fn test_dirty_pages_are_not_evicted() {
    let fx = setup(2, Duration::from_millis(100));
    fx.prefill(3, 1);
    let writer = TransactionId::allocate();
    fx.insert(writer, 7);

    let reader = TransactionId::allocate();
    fx.pool
        .get_page(reader, fx.page_id(1), Permission::ReadOnly)
        .unwrap();
    fx.pool
        .get_page(reader, fx.page_id(2), Permission::ReadOnly)
        .unwrap();

    assert!(fx.pool.is_cached(fx.page_id(0)));
    assert!(!fx.pool.is_cached(fx.page_id(1)));
    assert!(fx.pool.is_cached(fx.page_id(2)));
}

#[test]
fn test_no_evictable_page() {
    let fx = setup(1, Duration::from_millis(100));
    fx.prefill(2, 1);
    let tid = TransactionId::allocate();
    fx.insert(tid, 7);

    let result = fx
        .pool
        .get_page(tid, fx.page_id(1), Permission::ReadOnly);
    assert!(matches!(result, Err(DbError::NoEvictablePage)));
    assert_eq!(fx.pool.cached_pages(), vec![fx.page_id(0)]);
}

#[test]
fn test_commit_is_durable_and_logged() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    let tuple = fx.insert(tid, 5);
    let rid = tuple.record_id().unwrap();

    // Nothing reaches disk before commit besides the freshly allocated page
    let on_disk = fx.file.read_page(rid.page_id).unwrap();
    assert!(!on_disk.is_slot_used(rid.slot));

    fx.pool.transaction_complete(tid, true);

    let on_disk = fx.file.read_page(rid.page_id).unwrap();
    assert!(on_disk.is_slot_used(rid.slot));
    let stored = on_disk.tuple(rid.slot).unwrap();
    assert_eq!(stored.fields(), tuple.fields());

    let cached = fx
        .pool
        .get_page(TransactionId::allocate(), rid.page_id, Permission::ReadOnly)
        .unwrap();
    assert!(cached.read().is_dirty().is_none());
    assert_eq!(cached.read().page_data(), on_disk.page_data());
    assert_eq!(&*cached.read().before_image(), on_disk.page_data());

    let records = fx.wal.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tid, tid);
    assert_eq!(records[0].page_id, rid.page_id);
    assert_eq!(records[0].before, vec![0u8; PAGE_SIZE]);
    assert_eq!(records[0].after, on_disk.page_data());
}

#[test]
fn test_abort_restores_disk_state() {
    let fx = default_setup();
    fx.prefill(1, 3);
    let before = fx.file.read_page(fx.page_id(0)).unwrap();

    let tid = TransactionId::allocate();
    let mut victim = fx
        .pool
        .get_page(tid, fx.page_id(0), Permission::ReadWrite)
        .unwrap()
        .read()
        .tuple(1)
        .unwrap();
    fx.pool.delete_tuple(tid, &mut victim).unwrap();
    fx.insert(tid, 99);
    assert!(victim.record_id().is_none());

    fx.pool.transaction_complete(tid, false);

    let after = fx.file.read_page(fx.page_id(0)).unwrap();
    assert_eq!(after.page_data(), before.page_data());

    let cached = fx
        .pool
        .get_page(TransactionId::allocate(), fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    assert!(cached.read().is_dirty().is_none());
    assert_eq!(cached.read().page_data(), before.page_data());
    assert!(fx.wal.read_all().unwrap().is_empty());
}

#[test]
fn test_abort_of_appended_page() {
    let fx = default_setup();
    fx.prefill(1, SLOTS);

    let tid = TransactionId::allocate();
    fx.insert(tid, 1);
    assert_eq!(fx.file.num_pages().unwrap(), 2);
    fx.pool.transaction_complete(tid, false);

    // The page stays allocated but holds nothing
    let reader = TransactionId::allocate();
    assert_eq!(fx.scan(reader).len(), SLOTS);
    let page = fx.file.read_page(fx.page_id(1)).unwrap();
    assert_eq!(page.num_empty_slots(), SLOTS);
}

#[test]
fn test_abort_is_idempotent() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    fx.insert(tid, 1);

    fx.pool.transaction_complete(tid, false);
    let cached = fx.pool.cached_pages();
    fx.pool.transaction_complete(tid, false);

    assert_eq!(fx.pool.cached_pages(), cached);
    assert!(!fx.pool.holds_lock(tid, fx.page_id(0)));
}

#[test]
fn test_full_page_allocates_new_page() {
    let fx = default_setup();
    fx.prefill(1, SLOTS);
    assert_eq!(fx.file.num_pages().unwrap(), 1);

    let tid = TransactionId::allocate();
    let tuple = fx.insert(tid, 500);
    assert_eq!(fx.file.num_pages().unwrap(), 2);

    let rid = tuple.record_id().unwrap();
    assert_eq!(rid.page_id, fx.page_id(1));
    assert_eq!(rid.slot, 0);

    // The full page was released right away, the new page is still locked
    assert!(!fx.pool.holds_lock(tid, fx.page_id(0)));
    assert!(fx.pool.holds_lock(tid, fx.page_id(1)));

    assert!(fx.scan(tid).contains(&500));
    fx.pool.transaction_complete(tid, true);
    assert_eq!(fx.scan(TransactionId::allocate()).len(), SLOTS + 1);
}

#[test]
fn test_full_page_keeps_prior_lock() {
    let fx = default_setup();
    fx.prefill(1, SLOTS);
    let tid = TransactionId::allocate();
    fx.pool
        .get_page(tid, fx.page_id(0), Permission::ReadOnly)
        .unwrap();

    fx.insert(tid, 500);
    assert!(fx.pool.holds_lock(tid, fx.page_id(0)));
}

#[test]
fn test_fill_many_pages() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    for i in 0..(SLOTS * 3) as i32 {
        fx.insert(tid, i);
    }
    fx.pool.transaction_complete(tid, true);

    assert_eq!(fx.file.num_pages().unwrap(), 3);
    let expected: Vec<i32> = (0..(SLOTS * 3) as i32).collect();
    assert_eq!(fx.scan(TransactionId::allocate()), expected);
}

#[test]
fn test_delete_and_commit() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    let mut doomed = fx.insert(tid, 1);
    fx.insert(tid, 2);
    fx.pool.transaction_complete(tid, true);

    let tid = TransactionId::allocate();
    let rid = doomed.record_id().unwrap();
    fx.pool.delete_tuple(tid, &mut doomed).unwrap();
    fx.pool.transaction_complete(tid, true);

    assert!(!fx.file.read_page(rid.page_id).unwrap().is_slot_used(rid.slot));
    assert_eq!(fx.scan(TransactionId::allocate()), vec![2]);
}

#[test]
fn test_delete_requires_record_id() {
    let fx = default_setup();
    let mut tuple = fx.tuple(1, 1);
    let result = fx.pool.delete_tuple(TransactionId::allocate(), &mut tuple);
    assert!(matches!(result, Err(DbError::Record(_))));
}

#[test]
fn test_unknown_table() {
    let fx = default_setup();
    let mut tuple = fx.tuple(1, 1);
    let result = fx
        .pool
        .insert_tuple(TransactionId::allocate(), fx.table_id().wrapping_add(1), &mut tuple);
    assert!(matches!(result, Err(DbError::TableNotFound(_))));
}

#[test]
fn test_exclusive_lock_blocks_reader() {
    let fx = default_setup();
    fx.prefill(1, 1);
    let writer = TransactionId::allocate();
    fx.pool
        .get_page(writer, fx.page_id(0), Permission::ReadWrite)
        .unwrap();

    let reader = TransactionId::allocate();
    let start = Instant::now();
    let result = fx
        .pool
        .get_page(reader, fx.page_id(0), Permission::ReadOnly);
    assert!(start.elapsed() <= Duration::from_secs(2));
    match result {
        Err(err) => assert!(err.is_abort(), "{}", err),
        Ok(_) => panic!("reader acquired a page locked exclusively"),
    }
    assert!(!fx.pool.holds_lock(reader, fx.page_id(0)));

    fx.pool.transaction_complete(reader, false);
    fx.pool.transaction_complete(writer, true);
    fx.pool
        .get_page(reader, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
}

#[test]
fn test_shared_readers_and_upgrade() {
    let fx = default_setup();
    fx.prefill(1, 1);
    let (t1, t2) = (TransactionId::allocate(), TransactionId::allocate());

    let p1 = fx
        .pool
        .get_page(t1, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    let p2 = fx
        .pool
        .get_page(t2, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    assert!(Arc::ptr_eq(&p1, &p2));

    // No upgrade while another reader holds the page
    assert!(
        fx.pool
            .get_page(t1, fx.page_id(0), Permission::ReadWrite)
            .is_err()
    );

    fx.pool.transaction_complete(t2, true);
    fx.pool
        .get_page(t1, fx.page_id(0), Permission::ReadWrite)
        .unwrap();
}

#[test]
fn test_unsafe_release_page() {
    let fx = default_setup();
    fx.prefill(1, 1);
    let tid = TransactionId::allocate();
    fx.pool
        .get_page(tid, fx.page_id(0), Permission::ReadWrite)
        .unwrap();
    assert!(fx.pool.holds_lock(tid, fx.page_id(0)));

    fx.pool.unsafe_release_page(tid, fx.page_id(0));
    assert!(!fx.pool.holds_lock(tid, fx.page_id(0)));

    let other = TransactionId::allocate();
    fx.pool
        .get_page(other, fx.page_id(0), Permission::ReadWrite)
        .unwrap();
}

#[test]
fn test_discard_page_drops_changes() {
    let fx = default_setup();
    fx.prefill(1, 0);
    let tid = TransactionId::allocate();
    fx.insert(tid, 1);
    assert!(fx.pool.is_cached(fx.page_id(0)));

    fx.pool.discard_page(fx.page_id(0));
    assert!(!fx.pool.is_cached(fx.page_id(0)));
    fx.pool.transaction_complete(tid, true);

    assert_eq!(
        fx.file.read_page(fx.page_id(0)).unwrap().num_empty_slots(),
        SLOTS
    );
    assert!(fx.wal.read_all().unwrap().is_empty());
}

#[test]
fn test_flush_all_pages() {
    let fx = default_setup();
    let tid = TransactionId::allocate();
    for i in 0..=SLOTS as i32 {
        fx.insert(tid, i);
    }
    assert_eq!(fx.file.num_pages().unwrap(), 2);

    fx.pool.flush_all_pages().unwrap();
    assert_eq!(fx.wal.read_all().unwrap().len(), 2);
    assert_eq!(fx.file.read_page(fx.page_id(0)).unwrap().num_empty_slots(), 0);
    assert_eq!(
        fx.file.read_page(fx.page_id(1)).unwrap().num_empty_slots(),
        SLOTS - 1
    );

    // Nothing is left to flush
    fx.pool.flush_page(fx.page_id(0)).unwrap();
    fx.pool.flush_pages(tid).unwrap();
    fx.pool.transaction_complete(tid, true);
    assert_eq!(fx.wal.read_all().unwrap().len(), 2);
}

#[test]
fn test_concurrent_inserts() {
    let fx = Arc::new(setup(20, Duration::from_millis(200)));
    let workers = 4;
    let per_worker = 10;

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let fx = fx.clone();
            thread::spawn(move || {
                for i in 0..per_worker {
                    let value = w * 1000 + i;
                    // Retry until the transaction commits
                    loop {
                        let tid = TransactionId::allocate();
                        let mut tuple = fx.tuple(value, 0);
                        match fx.pool.insert_tuple(tid, fx.table_id(), &mut tuple) {
                            Ok(()) => {
                                fx.pool.transaction_complete(tid, true);
                                break;
                            }
                            Err(err) => {
                                assert!(err.is_abort(), "{}", err);
                                fx.pool.transaction_complete(tid, false);
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let values = fx.scan(TransactionId::allocate());
    assert_eq!(values.len(), (workers * per_worker) as usize);
}

#[test]
fn test_concurrent_inserts_into_single_slot_pages() {
    // 1 null-bitmap byte + 40 chars: one tuple per 64-byte page, so nearly
    // every insert appends and races other appenders for the new page
    let wide = Arc::new(TupleDesc::from_types(vec![DataType::Char(40)]));
    let fx = Arc::new(setup_with(wide.clone(), 64, Duration::from_millis(200), None));
    let workers = 8;
    let per_worker = 15;

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let fx = fx.clone();
            let wide = wide.clone();
            thread::spawn(move || {
                for i in 0..per_worker {
                    loop {
                        let tid = TransactionId::allocate();
                        let mut tuple = Tuple::with_fields(
                            wide.clone(),
                            vec![Field::String(format!("w{}-{}", w, i))],
                        )
                        .unwrap();
                        match fx.pool.insert_tuple(tid, fx.table_id(), &mut tuple) {
                            Ok(()) => {
                                fx.pool.transaction_complete(tid, true);
                                break;
                            }
                            Err(err) => {
                                assert!(err.is_abort(), "{}", err);
                                fx.pool.transaction_complete(tid, false);
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let tid = TransactionId::allocate();
    let mut iter = fx.file.iterator(&fx.pool, tid);
    iter.open().unwrap();
    assert_eq!(iter.map(|t| t.unwrap()).count(), workers * per_worker);
}

#[test]
fn test_failed_commit_discards_pages() {
    let fx = setup_with(desc(), 10, Duration::from_millis(100), Some(Arc::new(FailingLog)));
    fx.prefill(1, 0);
    let tid = TransactionId::allocate();
    fx.insert(tid, 1);

    fx.pool.transaction_complete(tid, true);
    assert!(!fx.pool.holds_lock(tid, fx.page_id(0)));
    assert!(!fx.pool.is_cached(fx.page_id(0)));

    // A later transaction sees the on-disk page, clean and empty
    let reader = TransactionId::allocate();
    let page = fx
        .pool
        .get_page(reader, fx.page_id(0), Permission::ReadWrite)
        .unwrap();
    assert!(page.read().is_dirty().is_none());
    assert_eq!(page.read().num_empty_slots(), SLOTS);
    assert_eq!(
        fx.file.read_page(fx.page_id(0)).unwrap().num_empty_slots(),
        SLOTS
    );
}

#[test]
fn test_failed_flush_keeps_page_dirty() {
    let fx = setup_with(desc(), 10, Duration::from_millis(100), Some(Arc::new(FailingLog)));
    let tid = TransactionId::allocate();
    fx.insert(tid, 1);

    let result = fx.pool.flush_pages(tid);
    assert!(matches!(result, Err(DbError::Log(_))));
    let page = fx
        .pool
        .get_page(tid, fx.page_id(0), Permission::ReadOnly)
        .unwrap();
    assert_eq!(page.read().is_dirty(), Some(tid));
}

#[test]
fn test_abort_with_failed_reload_releases_locks() {
    let fx = default_setup();
    fx.prefill(1, 0);
    let tid = TransactionId::allocate();
    fx.insert(tid, 1);

    // The page vanishes from disk, so the rollback cannot reread it
    std::fs::OpenOptions::new()
        .write(true)
        .open(fx.file.path())
        .unwrap()
        .set_len(0)
        .unwrap();

    fx.pool.transaction_complete(tid, false);
    assert!(!fx.pool.holds_lock(tid, fx.page_id(0)));
    assert!(!fx.pool.is_cached(fx.page_id(0)));
}

#[test]
fn test_page_size_mismatch() {
    let temp = TempDir::new().unwrap();
    let wal = Arc::new(WriteAheadLog::open(temp.path().join("x.wal")).unwrap());
    let file = Arc::new(HeapFile::create(temp.path().join("t.dat"), desc(), 128).unwrap());
    let config = StorageConfig::default().page_size(PAGE_SIZE);

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(file.clone(), "t");
    let result = BufferPool::new(config.clone(), catalog, wal.clone());
    assert!(matches!(result, Err(DbError::PageSizeMismatch { .. })));

    // Tables registered after the pool exists are checked on first use
    let catalog = Arc::new(Catalog::new());
    let pool = BufferPool::new(config, catalog.clone(), wal).unwrap();
    catalog.add_table(file.clone(), "t");
    let mut tuple = Tuple::with_fields(desc(), vec![Field::Int(1), Field::Int(2)]).unwrap();
    let result = pool.insert_tuple(TransactionId::allocate(), file.id(), &mut tuple);
    assert!(matches!(
        result,
        Err(DbError::PageSizeMismatch {
            expected: PAGE_SIZE,
            actual: 128,
            ..
        })
    ));
    assert_eq!(file.num_pages().unwrap(), 0);
}

#[test]
fn test_insert_ignores_column_names() {
    let named = Arc::new(TupleDesc::new(vec![
        ColumnDef::new("id", DataType::Int),
        ColumnDef::new("score", DataType::Int),
    ]));
    let fx = setup_with(named, 10, Duration::from_millis(100), None);

    // `fx.tuple` builds tuples with generated names c0, c1
    let tid = TransactionId::allocate();
    fx.insert(tid, 3);
    fx.pool.transaction_complete(tid, true);
    assert_eq!(fx.scan(TransactionId::allocate()), vec![3]);

    let mut wrong = Tuple::with_fields(
        Arc::new(TupleDesc::from_types(vec![DataType::Int])),
        vec![Field::Int(1)],
    )
    .unwrap();
    let result = fx
        .pool
        .insert_tuple(TransactionId::allocate(), fx.table_id(), &mut wrong);
    assert!(matches!(result, Err(DbError::Record(_))));
}
