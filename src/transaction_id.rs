use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque transaction handle, minted by `TxnCoordinator::begin_transaction`.
///
/// Unlike the teacher's `Transaction` struct, this type carries no
/// `commit`/`abort` methods of its own: all lifecycle operations live on
/// `TxnCoordinator`, matching the external interface in `SPEC_FULL.md` §6 and
/// avoiding a second, implicit path to global state.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn raw(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn for_test(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}
