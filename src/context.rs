use std::sync::Arc;

use crate::{cache::PageCache, collaborators::Catalog, collaborators::LogSink, lock_table::LockTable};

/// Bundles the collaborators a [`crate::coordinator::TxnCoordinator`] needs:
/// the page cache, the lock table, the catalog, and the log.
///
/// The reference implementation reached these through a `Unique::global()`
/// singleton built with `mem::transmute` and `std::sync::Once`. This crate
/// builds `DbContext` explicitly and threads it through constructors instead
/// (`SPEC_FULL.md` §2, §9): no unsafe, no hidden process-wide state, and
/// tests can stand up as many independent contexts as they like.
pub struct DbContext {
    pub cache: PageCache,
    pub lock_table: LockTable,
    pub catalog: Arc<dyn Catalog>,
    pub log: Arc<dyn LogSink>,
}

impl DbContext {
    pub fn new(cache_capacity: usize, catalog: Arc<dyn Catalog>, log: Arc<dyn LogSink>) -> Self {
        Self {
            cache: PageCache::new(cache_capacity, catalog.clone(), log.clone()),
            lock_table: LockTable::new(),
            catalog,
            log,
        }
    }
}
