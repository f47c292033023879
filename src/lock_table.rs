use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Condvar, Mutex},
};

use log::debug;

use crate::{
    error::CoreError,
    page_id::PageId,
    transaction_id::TransactionId,
    wait_for_graph::WaitForGraph,
};

/// Page lock mode. A two-variant enum rather than a boolean, per the
/// spec's explicit guidance (`SPEC_FULL.md` §9).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Default)]
struct PageLockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl PageLockState {
    fn grantable(&self, tx: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.exclusive.is_none() || self.exclusive == Some(tx),
            LockMode::Exclusive => {
                let exclusive_ok = self.exclusive.is_none() || self.exclusive == Some(tx);
                let shared_ok = self.shared.is_empty()
                    || (self.shared.len() == 1 && self.shared.contains(&tx));
                exclusive_ok && shared_ok
            }
        }
    }

    /// Precondition: `grantable(tx, mode)` is true.
    fn apply_grant(&mut self, tx: TransactionId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                // If `tx` already holds the exclusive lock, re-reading under
                // shared mode is a trivial no-op: adding `tx` to `shared`
                // while it also holds `exclusive` would violate the
                // invariant `exclusive = Some(t) => shared = empty`.
                if self.exclusive != Some(tx) {
                    self.shared.insert(tx);
                }
            }
            LockMode::Exclusive => {
                // Upgrade: `tx` was the sole shared holder.
                self.shared.remove(&tx);
                self.exclusive = Some(tx);
            }
        }
    }

    /// Holders whose lock conflicts with `tx` requesting `mode`, used to
    /// populate wait-for edges before blocking.
    fn conflicting_holders(&self, tx: TransactionId, mode: LockMode) -> Vec<TransactionId> {
        let mut holders = Vec::new();
        if let Some(x) = self.exclusive {
            if x != tx {
                holders.push(x);
            }
        }
        if mode == LockMode::Exclusive {
            holders.extend(self.shared.iter().copied().filter(|&t| t != tx));
        }
        holders
    }

    fn release(&mut self, tx: TransactionId) {
        self.shared.remove(&tx);
        if self.exclusive == Some(tx) {
            self.exclusive = None;
        }
    }
}

struct PageMonitor {
    state: Mutex<PageLockState>,
    cv: Condvar,
}

impl PageMonitor {
    fn new() -> Self {
        Self {
            state: Mutex::new(PageLockState::default()),
            cv: Condvar::new(),
        }
    }
}

/// Per-page shared/exclusive locks, a wait-for graph, and deadlock
/// detection by cycle search. See `SPEC_FULL.md` §4.2 for the full
/// contract and state machine.
pub struct LockTable {
    monitors: Mutex<HashMap<PageId, Arc<PageMonitor>>>,
    txn_pages: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    wait_for: Mutex<WaitForGraph>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            monitors: Mutex::new(HashMap::new()),
            txn_pages: Mutex::new(HashMap::new()),
            wait_for: Mutex::new(WaitForGraph::new()),
        }
    }

    fn monitor_for(&self, pid: PageId) -> Arc<PageMonitor> {
        let mut monitors = self.monitors.lock().unwrap();
        monitors
            .entry(pid)
            .or_insert_with(|| Arc::new(PageMonitor::new()))
            .clone()
    }

    /// Block until `tx` is granted `mode` on `pid`, or fail with
    /// `CoreError::Aborted` if granting it would close a cycle in the
    /// wait-for graph.
    pub fn acquire(&self, tx: TransactionId, pid: PageId, mode: LockMode) -> Result<(), CoreError> {
        let monitor = self.monitor_for(pid);
        let mut state = monitor.state.lock().unwrap();

        loop {
            if state.grantable(tx, mode) {
                state.apply_grant(tx, mode);
                drop(state);
                self.record_page(tx, pid);
                self.wait_for.lock().unwrap().remove_outgoing(tx);
                debug!("lock granted: tx={} pid={} mode={:?}", tx, pid, mode);
                return Ok(());
            }

            // Lock order: this page's monitor is already held; the
            // wait-for-graph mutex nests inside it (SPEC_FULL.md §5).
            let conflicts = state.conflicting_holders(tx, mode);
            {
                let mut wf = self.wait_for.lock().unwrap();
                for holder in conflicts {
                    wf.add_edge(tx, holder);
                }
                if wf.has_cycle_from(tx) {
                    wf.remove_outgoing(tx);
                    return Err(CoreError::aborted(format!(
                        "deadlock detected: tx={} pid={} mode={:?}",
                        tx, pid, mode
                    )));
                }
            }

            debug!("lock blocked: tx={} pid={} mode={:?}, waiting", tx, pid, mode);
            state = monitor.cv.wait(state).unwrap();
        }
    }

    fn record_page(&self, tx: TransactionId, pid: PageId) {
        self.txn_pages
            .lock()
            .unwrap()
            .entry(tx)
            .or_insert_with(HashSet::new)
            .insert(pid);
    }

    /// Drop any claim `tx` holds on `pid`; no-op if none. Wakes waiters.
    ///
    /// Documented as unsafe for general use: unlike `release_all`, this
    /// does not clear `tx`'s page-set bookkeeping, so `holds`/`pages` will
    /// keep reporting `pid` for the lifetime of the transaction (see
    /// `SPEC_FULL.md` §3 on `TxnPageSet`).
    pub fn release(&self, tx: TransactionId, pid: PageId) {
        let monitor = self.monitor_for(pid);
        {
            let mut state = monitor.state.lock().unwrap();
            state.release(tx);
        }
        monitor.cv.notify_all();
    }

    /// Release every lock `tx` currently holds and drop its page-set entry.
    pub fn release_all(&self, tx: TransactionId) {
        let pages: Vec<PageId> = {
            let mut txn_pages = self.txn_pages.lock().unwrap();
            txn_pages.remove(&tx).map(|s| s.into_iter().collect()).unwrap_or_default()
        };
        for pid in pages {
            self.release(tx, pid);
        }
        self.wait_for.lock().unwrap().remove_outgoing(tx);
    }

    pub fn holds(&self, tx: TransactionId, pid: PageId) -> bool {
        self.txn_pages
            .lock()
            .unwrap()
            .get(&tx)
            .map(|pages| pages.contains(&pid))
            .unwrap_or(false)
    }

    /// Owned snapshot of the pages `tx` has ever been granted a lock on
    /// during its lifetime, never a live view (SPEC_FULL.md §9).
    pub fn pages(&self, tx: TransactionId) -> Vec<PageId> {
        self.txn_pages
            .lock()
            .unwrap()
            .get(&tx)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc as StdArc, thread, time::Duration};

    fn pid(n: u64) -> PageId {
        PageId::new(0, n)
    }

    fn tx(id: u64) -> TransactionId {
        TransactionId::for_test(id)
    }

    #[test]
    fn shared_shared_coexist() {
        let lt = LockTable::new();
        lt.acquire(tx(1), pid(1), LockMode::Shared).unwrap();
        lt.acquire(tx(2), pid(1), LockMode::Shared).unwrap();
        assert!(lt.holds(tx(1), pid(1)));
        assert!(lt.holds(tx(2), pid(1)));
    }

    #[test]
    fn upgrade_shared_to_exclusive() {
        let lt = LockTable::new();
        lt.acquire(tx(1), pid(1), LockMode::Shared).unwrap();
        lt.acquire(tx(1), pid(1), LockMode::Exclusive).unwrap();
        assert!(lt.holds(tx(1), pid(1)));
    }

    #[test]
    fn exclusive_excludes_shared_until_release() {
        let lt = StdArc::new(LockTable::new());
        lt.acquire(tx(1), pid(1), LockMode::Exclusive).unwrap();

        let lt2 = lt.clone();
        let handle = thread::spawn(move || {
            lt2.acquire(tx(2), pid(1), LockMode::Shared).unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        lt.release(tx(1), pid(1));
        handle.join().unwrap();
        assert!(lt.holds(tx(2), pid(1)));
    }

    #[test]
    fn release_all_wakes_waiters_and_clears_page_set() {
        let lt = StdArc::new(LockTable::new());
        lt.acquire(tx(1), pid(1), LockMode::Exclusive).unwrap();

        let lt2 = lt.clone();
        let handle = thread::spawn(move || {
            lt2.acquire(tx(2), pid(1), LockMode::Exclusive).unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        lt.release_all(tx(1));
        handle.join().unwrap();
        assert!(lt.pages(tx(1)).is_empty());
    }

    #[test]
    fn two_party_deadlock_aborts_one_side() {
        let lt = StdArc::new(LockTable::new());
        lt.acquire(tx(1), pid(1), LockMode::Exclusive).unwrap();
        lt.acquire(tx(2), pid(2), LockMode::Exclusive).unwrap();

        let lt_a = lt.clone();
        let t1 = thread::spawn(move || lt_a.acquire(tx(1), pid(2), LockMode::Shared));

        // give t1 time to enroll as a waiter on pid(2) before t2 requests pid(1);
        // with this ordering t2 is always the one that closes the cycle.
        thread::sleep(Duration::from_millis(50));

        let result2 = lt.acquire(tx(2), pid(1), LockMode::Shared);
        assert!(result2.is_err(), "the second party should be aborted to break the cycle");

        // t2 still holds its original exclusive lock on pid(2); releasing it
        // is what lets t1 (blocked waiting on pid(2)) make progress.
        lt.release_all(tx(2));

        let result1 = t1.join().unwrap();
        assert!(result1.is_ok(), "the survivor should proceed once the victim releases its locks");
        lt.release_all(tx(1));
    }
}
