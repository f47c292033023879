use std::{
    collections::HashSet,
    sync::Mutex,
};

use log::{info, warn};

use crate::{
    collaborators::Tuple,
    context::DbContext,
    error::CoreError,
    lock_table::LockMode,
    page::Page,
    page_id::{PageId, TableId},
    transaction_id::TransactionId,
    types::{CoreResult, Pod},
};

/// Drives transactions through two-phase locking and a NO-STEAL / FORCE
/// recovery policy on top of a [`DbContext`]. See `SPEC_FULL.md` §4.3 and §6
/// for the full external interface this type implements.
pub struct TxnCoordinator {
    ctx: DbContext,
    finished: Mutex<HashSet<TransactionId>>,
}

impl TxnCoordinator {
    pub fn new(ctx: DbContext) -> Self {
        Self { ctx, finished: Mutex::new(HashSet::new()) }
    }

    pub fn begin_transaction(&self) -> TransactionId {
        let txn = TransactionId::next();
        info!("begin {}", txn);
        txn
    }

    /// Admit `pid` into the cache, then acquire `mode` on it (blocking,
    /// possibly aborting on deadlock). Admission happens first so the cache
    /// layer can fail fast (e.g. `CacheFull`) before a transaction waits on
    /// or is enrolled in the wait-for graph for a page it can't even admit.
    /// A caller that writes through the returned handle must still call
    /// [`Self::mark_dirty`] to record the write.
    pub fn get_page(&self, txn: TransactionId, pid: PageId, mode: LockMode) -> Result<Pod<Page>, CoreError> {
        let page = self.ctx.cache.admit(pid)?;
        self.ctx.lock_table.acquire(txn, pid, mode)?;
        Ok(page)
    }

    /// Record that `txn` dirtied `pid`. The caller must hold the exclusive
    /// lock on `pid` (acquired via `get_page`) before calling this.
    pub fn mark_dirty(&self, txn: TransactionId, pid: PageId) -> CoreResult {
        self.ctx.cache.put_dirty(pid, txn)
    }

    pub fn release_page(&self, txn: TransactionId, pid: PageId) {
        self.ctx.lock_table.release(txn, pid);
    }

    pub fn holds_lock(&self, txn: TransactionId, pid: PageId) -> bool {
        self.ctx.lock_table.holds(txn, pid)
    }

    /// Delegate to the table's access method, then mark every page it
    /// reports dirtying. The access method is expected to have acquired its
    /// own locks via `get_page` before returning.
    pub fn insert_tuple(&self, txn: TransactionId, table_id: TableId, tuple: &Tuple) -> CoreResult {
        let file = self.ctx.catalog.file_for(table_id)?;
        let dirtied = file.insert_tuple(self, txn, tuple)?;
        for pid in dirtied {
            self.mark_dirty(txn, pid)?;
        }
        Ok(())
    }

    pub fn delete_tuple(&self, txn: TransactionId, table_id: TableId, tuple: &Tuple) -> CoreResult {
        let file = self.ctx.catalog.file_for(table_id)?;
        let dirtied = file.delete_tuple(self, txn, tuple)?;
        for pid in dirtied {
            self.mark_dirty(txn, pid)?;
        }
        Ok(())
    }

    /// FORCE commit: flush every page `txn` dirtied (log write + force, then
    /// page write, then before-image refresh), then release all of its
    /// locks. Idempotent: a second call on an already-finished transaction
    /// is a no-op.
    pub fn commit_transaction(&self, txn: TransactionId) -> CoreResult {
        if !self.finished.lock().unwrap().insert(txn) {
            return Ok(());
        }
        for pid in self.ctx.lock_table.pages(txn) {
            self.ctx.cache.flush(pid)?;
            self.ctx.cache.refresh_before_image(pid);
        }
        self.ctx.lock_table.release_all(txn);
        info!("commit {}", txn);
        Ok(())
    }

    /// Roll back: restore the before-image of every page `txn` dirtied
    /// (discarding its writes without ever having flushed them, per
    /// NO-STEAL), then release all of its locks. Idempotent.
    pub fn abort_transaction(&self, txn: TransactionId) {
        if !self.finished.lock().unwrap().insert(txn) {
            return;
        }
        for pid in self.ctx.lock_table.pages(txn) {
            self.ctx.cache.restore_before_image(pid, txn);
        }
        self.ctx.lock_table.release_all(txn);
        warn!("abort {}", txn);
    }

    pub fn flush_all_pages(&self) -> CoreResult {
        self.ctx.cache.flush_all()
    }

    pub fn discard_page(&self, pid: PageId) {
        self.ctx.cache.discard(pid);
    }

    pub fn context(&self) -> &DbContext {
        &self.ctx
    }
}
