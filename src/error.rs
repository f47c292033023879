use std::{error::Error, fmt, io};

use backtrace::Backtrace;

/// Errors raised by the core (cache / lock table / coordinator).
///
/// The core never catches its own errors; it restores invariants (locks
/// released, dirty bits cleared on abort) and rethrows via `?`. See
/// `SPEC_FULL.md` §7 for the propagation policy.
#[derive(Debug)]
pub enum CoreError {
    /// Raised by `LockTable::acquire` when a wait-for cycle involving the
    /// requesting transaction is detected. The caller must invoke
    /// `abort_transaction`.
    Aborted { detail: String, backtrace: Backtrace },
    /// Every resident page is dirty and eviction cannot proceed.
    CacheFull,
    /// Propagated from the underlying file or log.
    Io(io::Error),
    /// Generic invariant violation raised by a collaborator (e.g. schema
    /// mismatch at insert). Never produced by the core itself.
    Db(String),
}

impl CoreError {
    pub fn aborted(detail: impl Into<String>) -> Self {
        CoreError::Aborted {
            detail: detail.into(),
            backtrace: Backtrace::new(),
        }
    }

    pub fn db(detail: impl Into<String>) -> Self {
        CoreError::Db(detail.into())
    }

    /// Dump the captured backtrace to the log at error level. Only
    /// meaningful for `Aborted`; a no-op for other variants.
    pub fn show_backtrace(&self) {
        if let CoreError::Aborted { detail, backtrace } = self {
            log::error!("deadlock detected: {}\n{:?}", detail, backtrace);
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Aborted { detail, .. } => write!(f, "aborted: {}", detail),
            CoreError::CacheFull => write!(f, "cache full: no clean page available for eviction"),
            CoreError::Io(e) => write!(f, "io error: {}", e),
            CoreError::Db(msg) => write!(f, "db error: {}", msg),
        }
    }
}

impl Error for CoreError {}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        CoreError::Io(e)
    }
}
