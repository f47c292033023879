use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{page_id::PageId, transaction_id::TransactionId};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// The one piece of process-wide state the core cannot avoid (see
/// `SPEC_FULL.md` §9). Isolated behind accessors and mutable only through
/// `set_page_size`, which tests use to shrink pages so that small fixtures
/// still exercise eviction and splitting logic.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

pub fn get_page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}

/// A resident, fixed-width block of bytes plus the metadata the cache needs
/// to implement NO-STEAL / FORCE: who dirtied it, and what it looked like
/// before that.
#[derive(Clone, Debug)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirtied_by: Option<TransactionId>,
}

impl Page {
    /// Construct a page as it was just read from disk: `data` becomes both
    /// the live contents and the initial before-image.
    pub fn from_disk(id: PageId, data: Vec<u8>) -> Self {
        Self {
            id,
            before_image: data.clone(),
            data,
            dirtied_by: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }

    /// Mark the page dirty on behalf of `by`. Per the lock-table invariant
    /// (`X = Some(t) => S = empty`), only the transaction holding the
    /// exclusive lock should ever call this.
    pub fn mark_dirty(&mut self, by: TransactionId) {
        self.dirtied_by = Some(by);
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirtied_by = None;
    }

    /// `before_image := current contents`. Called after a commit-flush.
    pub(crate) fn refresh_before_image(&mut self) {
        self.before_image = self.data.clone();
    }

    /// Replace the live contents with the before-image, discarding whatever
    /// the dirtying transaction wrote. Used by abort.
    pub(crate) fn restore_before_image(&mut self) {
        self.data = self.before_image.clone();
        self.dirtied_by = None;
    }
}
