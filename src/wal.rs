use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::debug;

use crate::{
    collaborators::LogSink, error::CoreError, page_id::PageId, transaction_id::TransactionId,
};

/// A minimal append-only write-ahead log: one record per `write_log` call,
/// `force` fsyncs it. This crate does not implement log recovery or a
/// stable on-disk record format (`SPEC_FULL.md` §1 Non-goals) — this is
/// just enough to let `PageCache::flush` demonstrate the FORCE ordering
/// (log write, then log force, then page write) end to end.
///
/// Record layout: `txn_id: u64, table_id: i32, page_index: u64, before_len:
/// u64, before, after_len: u64, after`, all big-endian.
pub struct LogFile {
    file: Mutex<File>,
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file: Mutex::new(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for LogFile {
    fn write_log(
        &self,
        txn: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<(), CoreError> {
        let mut file = self.file.lock().unwrap();
        file.write_all(&txn.raw().to_be_bytes())?;
        file.write_all(&pid.table_id.to_be_bytes())?;
        file.write_all(&pid.page_index.to_be_bytes())?;
        file.write_all(&(before.len() as u64).to_be_bytes())?;
        file.write_all(before)?;
        file.write_all(&(after.len() as u64).to_be_bytes())?;
        file.write_all(after)?;
        debug!("wrote log record for tx={} pid={}", txn, pid);
        Ok(())
    }

    fn force(&self) -> Result<(), CoreError> {
        let file = self.file.lock().unwrap();
        file.sync_all()?;
        Ok(())
    }
}
