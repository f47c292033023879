use std::sync::Arc;

use crate::{
    coordinator::TxnCoordinator, error::CoreError, page_id::{PageId, TableId},
    transaction_id::TransactionId,
};

/// An opaque row. The core does not interpret tuple contents; schema and
/// encoding are entirely the access method's business (out of scope here,
/// per `SPEC_FULL.md` §1 Non-goals).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tuple(pub Vec<u8>);

/// The per-table access method the coordinator delegates `insert_tuple` /
/// `delete_tuple` to. Required of collaborators (`SPEC_FULL.md` §6):
/// mutation methods are expected to acquire their own write locks via
/// `coordinator.get_page`, and report back every page they dirtied so the
/// coordinator can mark it and reinsert it into the cache.
pub trait TableFile: Send + Sync {
    fn read_page(&self, pid: &PageId) -> Result<Vec<u8>, CoreError>;
    fn write_page(&self, pid: &PageId, data: &[u8]) -> Result<(), CoreError>;

    fn insert_tuple(
        &self,
        coordinator: &TxnCoordinator,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, CoreError>;

    fn delete_tuple(
        &self,
        coordinator: &TxnCoordinator,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, CoreError>;

    fn iterator<'a>(
        &'a self,
        coordinator: &'a TxnCoordinator,
        txn: TransactionId,
    ) -> Box<dyn Iterator<Item = Tuple> + 'a>;
}

/// Resolves a `TableId` to the access method responsible for it.
pub trait Catalog: Send + Sync {
    fn file_for(&self, table_id: TableId) -> Result<Arc<dyn TableFile>, CoreError>;
}

/// The write-ahead log interface the core depends on. The core emits
/// before/after images and forces them; it does not implement a log record
/// format or recovery (`SPEC_FULL.md` §1 Non-goals).
pub trait LogSink: Send + Sync {
    fn write_log(
        &self,
        txn: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<(), CoreError>;

    fn force(&self) -> Result<(), CoreError>;
}
