use std::{
    sync::{Arc, Mutex, Once},
    thread,
    time::Duration,
};

use txpage::{
    collaborators::{Catalog, LogSink, TableFile, Tuple},
    context::DbContext,
    coordinator::TxnCoordinator,
    error::CoreError,
    lock_table::LockMode,
    page_id::{PageId, TableId},
    transaction_id::TransactionId,
    utils::{init_log, HandyRwLock},
};

static LOG_INIT: Once = Once::new();

// A single-table, in-memory catalog/file pair good enough to drive the
// coordinator's contract without a real access method getting in the way.
struct RawFile(Mutex<std::collections::HashMap<PageId, Vec<u8>>>);

impl TableFile for RawFile {
    fn read_page(&self, pid: &PageId) -> Result<Vec<u8>, CoreError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .get(pid)
            .cloned()
            .unwrap_or_else(|| vec![0u8; txpage::page::get_page_size()]))
    }
    fn write_page(&self, pid: &PageId, data: &[u8]) -> Result<(), CoreError> {
        self.0.lock().unwrap().insert(*pid, data.to_vec());
        Ok(())
    }
    fn insert_tuple(&self, _c: &TxnCoordinator, _t: TransactionId, _tup: &Tuple) -> Result<Vec<PageId>, CoreError> {
        unimplemented!("these tests drive pages directly through TxnCoordinator::get_page")
    }
    fn delete_tuple(&self, _c: &TxnCoordinator, _t: TransactionId, _tup: &Tuple) -> Result<Vec<PageId>, CoreError> {
        unimplemented!()
    }
    fn iterator<'a>(&'a self, _c: &'a TxnCoordinator, _t: TransactionId) -> Box<dyn Iterator<Item = Tuple> + 'a> {
        unimplemented!()
    }
}

struct OneTableCatalog(Arc<RawFile>);

impl Catalog for OneTableCatalog {
    fn file_for(&self, _table_id: TableId) -> Result<Arc<dyn TableFile>, CoreError> {
        Ok(self.0.clone())
    }
}

/// Records every call so scenario 6 can assert ordering.
struct SpyLog {
    calls: Mutex<Vec<&'static str>>,
}

impl LogSink for SpyLog {
    fn write_log(&self, _: TransactionId, _: PageId, _: &[u8], _: &[u8]) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push("write_log");
        Ok(())
    }
    fn force(&self) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push("force");
        Ok(())
    }
}

struct SpyFile {
    inner: RawFile,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl TableFile for SpyFile {
    fn read_page(&self, pid: &PageId) -> Result<Vec<u8>, CoreError> {
        self.inner.read_page(pid)
    }
    fn write_page(&self, pid: &PageId, data: &[u8]) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push("write_page");
        self.inner.write_page(pid, data)
    }
    fn insert_tuple(&self, _c: &TxnCoordinator, _t: TransactionId, _tup: &Tuple) -> Result<Vec<PageId>, CoreError> {
        unimplemented!()
    }
    fn delete_tuple(&self, _c: &TxnCoordinator, _t: TransactionId, _tup: &Tuple) -> Result<Vec<PageId>, CoreError> {
        unimplemented!()
    }
    fn iterator<'a>(&'a self, _c: &'a TxnCoordinator, _t: TransactionId) -> Box<dyn Iterator<Item = Tuple> + 'a> {
        unimplemented!()
    }
}

struct SpyCatalog(Arc<SpyFile>);

impl Catalog for SpyCatalog {
    fn file_for(&self, _table_id: TableId) -> Result<Arc<dyn TableFile>, CoreError> {
        Ok(self.0.clone())
    }
}

fn pid(n: u64) -> PageId {
    PageId::new(0, n)
}

fn setup(capacity: usize) -> TxnCoordinator {
    LOG_INIT.call_once(init_log);
    let file = Arc::new(RawFile(Mutex::new(std::collections::HashMap::new())));
    let catalog: Arc<dyn Catalog> = Arc::new(OneTableCatalog(file));
    let log: Arc<dyn LogSink> = Arc::new(txpage::wal::LogFile::new(
        std::env::temp_dir().join(format!("txpage-it-{}-{:p}", std::process::id(), &capacity)),
    ).unwrap());
    TxnCoordinator::new(DbContext::new(capacity, catalog, log))
}

// Scenario 1: eviction only picks clean pages.
#[test]
fn eviction_only_picks_clean_pages() {
    let c = setup(2);
    let t1 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    c.mark_dirty(t1, pid(0)).unwrap();
    c.get_page(t1, pid(1), LockMode::Exclusive).unwrap();
    c.mark_dirty(t1, pid(1)).unwrap();

    let t2 = c.begin_transaction();
    let err = c.get_page(t2, pid(2), LockMode::Shared).unwrap_err();
    assert!(matches!(err, CoreError::CacheFull));

    c.commit_transaction(t1).unwrap();
    c.abort_transaction(t2);
}

// Scenario 2: shared-shared coexistence.
#[test]
fn shared_shared_coexistence() {
    let c = setup(4);
    let t1 = c.begin_transaction();
    let t2 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Shared).unwrap();
    c.get_page(t2, pid(0), LockMode::Shared).unwrap();
    assert!(c.holds_lock(t1, pid(0)));
    assert!(c.holds_lock(t2, pid(0)));
    c.commit_transaction(t1).unwrap();
    c.commit_transaction(t2).unwrap();
}

// Scenario 3: writer excludes readers until commit.
#[test]
fn writer_excludes_readers_until_commit() {
    let c = Arc::new(setup(4));
    let t1 = c.begin_transaction();
    let page = c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    page.wl().data_mut()[0] = 7;
    c.mark_dirty(t1, pid(0)).unwrap();

    let c2 = c.clone();
    let reader = thread::spawn(move || {
        let t2 = c2.begin_transaction();
        let page = c2.get_page(t2, pid(0), LockMode::Shared).unwrap();
        let value = page.rl().data()[0];
        c2.commit_transaction(t2).unwrap();
        value
    });

    thread::sleep(Duration::from_millis(50));
    c.commit_transaction(t1).unwrap();

    assert_eq!(reader.join().unwrap(), 7);
}

// Scenario 4: upgrade in place.
#[test]
fn upgrade_shared_to_exclusive_in_place() {
    let c = setup(4);
    let t1 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Shared).unwrap();
    c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    assert!(c.holds_lock(t1, pid(0)));
    c.commit_transaction(t1).unwrap();
}

// Scenario 5: two-party deadlock, victim aborts, survivor proceeds.
#[test]
fn two_party_deadlock_resolves() {
    let c = Arc::new(setup(4));
    let t1 = c.begin_transaction();
    let t2 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    c.get_page(t2, pid(1), LockMode::Exclusive).unwrap();

    let c1 = c.clone();
    let waiter = thread::spawn(move || c1.get_page(t1, pid(1), LockMode::Shared));

    thread::sleep(Duration::from_millis(50));
    let closer = c.get_page(t2, pid(0), LockMode::Shared);
    assert!(closer.is_err(), "closing the cycle must abort one side");
    c.abort_transaction(t2);

    assert!(waiter.join().unwrap().is_ok());
    c.abort_transaction(t1);
}

// Scenario 6: commit durability order (log force precedes page write).
#[test]
fn commit_durability_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let file = Arc::new(SpyFile {
        inner: RawFile(Mutex::new(std::collections::HashMap::new())),
        calls: calls.clone(),
    });
    let catalog: Arc<dyn Catalog> = Arc::new(SpyCatalog(file));
    let log = Arc::new(SpyLog { calls: Mutex::new(Vec::new()) });

    let c = TxnCoordinator::new(DbContext::new(4, catalog, log.clone()));
    let t1 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    c.mark_dirty(t1, pid(0)).unwrap();
    c.commit_transaction(t1).unwrap();

    let log_order = log.calls.lock().unwrap().clone();
    let file_order = calls.lock().unwrap().clone();
    assert_eq!(log_order, vec!["write_log", "force"]);
    assert_eq!(file_order, vec!["write_page"]);
}

// Scenario 7: abort rollback is visible to a later reader.
#[test]
fn abort_rollback_is_visible_to_later_reader() {
    let c = setup(4);
    let t1 = c.begin_transaction();
    let page = c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    let original = page.rl().data()[0];
    page.wl().data_mut()[0] = original.wrapping_add(1);
    c.mark_dirty(t1, pid(0)).unwrap();
    c.abort_transaction(t1);

    let t2 = c.begin_transaction();
    let page2 = c.get_page(t2, pid(0), LockMode::Shared).unwrap();
    assert_eq!(page2.rl().data()[0], original);
    c.commit_transaction(t2).unwrap();
}

// R1: a second commit is a no-op.
#[test]
fn second_commit_is_a_no_op() {
    let c = setup(4);
    let t1 = c.begin_transaction();
    c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    c.mark_dirty(t1, pid(0)).unwrap();
    c.commit_transaction(t1).unwrap();
    c.commit_transaction(t1).unwrap();
}

// R2: abort after commit has no further effect.
#[test]
fn abort_after_commit_has_no_effect() {
    let c = setup(4);
    let t1 = c.begin_transaction();
    let page = c.get_page(t1, pid(0), LockMode::Exclusive).unwrap();
    page.wl().data_mut()[0] = 5;
    c.mark_dirty(t1, pid(0)).unwrap();
    c.commit_transaction(t1).unwrap();
    c.abort_transaction(t1);

    let t2 = c.begin_transaction();
    let page2 = c.get_page(t2, pid(0), LockMode::Shared).unwrap();
    assert_eq!(page2.rl().data()[0], 5);
    c.commit_transaction(t2).unwrap();
}
