//! A minimal slotted heap file, real enough to drive `insert_tuple` /
//! `delete_tuple` / scans through the coordinator end to end in tests, but
//! with none of a real access method's schema, indexing or compaction.
//!
//! Slot layout mirrors this crate's btree page header: a `BitVec` of
//! occupied-slot bits followed by fixed-width tuple slots.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use bit_vec::BitVec;

use crate::{
    collaborators::{Catalog, TableFile, Tuple},
    coordinator::TxnCoordinator,
    error::CoreError,
    lock_table::LockMode,
    page::get_page_size,
    page_id::{PageId, TableId},
    transaction_id::TransactionId,
    utils::HandyRwLock,
};

fn slots_per_page(tuple_size: usize) -> usize {
    (get_page_size() * 8) / (tuple_size * 8 + 1)
}

fn header_bytes(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

struct HeapLayout {
    tuple_size: usize,
    num_slots: usize,
    header_bytes: usize,
}

impl HeapLayout {
    fn new(tuple_size: usize) -> Self {
        let num_slots = slots_per_page(tuple_size);
        Self { tuple_size, num_slots, header_bytes: header_bytes(num_slots) }
    }

    fn read_bitmap(&self, data: &[u8]) -> BitVec {
        BitVec::from_bytes(&data[..self.header_bytes])
    }

    fn write_bitmap(&self, data: &mut [u8], bits: &BitVec) {
        data[..self.header_bytes].copy_from_slice(&bits.to_bytes());
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_bytes + slot * self.tuple_size;
        start..start + self.tuple_size
    }
}

/// A heap-organized table: an append-only sequence of fixed-size pages, each
/// holding a bitmap of occupied slots. No compaction, no variable-length
/// tuples, no indexes (`SPEC_FULL.md` §1 Non-goals: access methods are out
/// of scope beyond exercising the coordinator's contract).
pub struct HeapFile {
    table_id: TableId,
    layout: HeapLayout,
    num_pages: Mutex<u64>,
    backing: Arc<RwLock<HashMap<PageId, Vec<u8>>>>,
}

impl HeapFile {
    pub fn new(table_id: TableId, tuple_size: usize) -> Self {
        Self {
            table_id,
            layout: HeapLayout::new(tuple_size),
            num_pages: Mutex::new(0),
            backing: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn page_id(&self, index: u64) -> PageId {
        PageId::new(self.table_id, index)
    }

    fn allocate_page(&self) -> PageId {
        let mut num_pages = self.num_pages.lock().unwrap();
        let pid = self.page_id(*num_pages);
        *num_pages += 1;
        pid
    }

    fn num_pages(&self) -> u64 {
        *self.num_pages.lock().unwrap()
    }
}

impl TableFile for HeapFile {
    fn read_page(&self, pid: &PageId) -> Result<Vec<u8>, CoreError> {
        Ok(self
            .backing
            .rl()
            .get(pid)
            .cloned()
            .unwrap_or_else(|| vec![0u8; get_page_size()]))
    }

    fn write_page(&self, pid: &PageId, data: &[u8]) -> Result<(), CoreError> {
        self.backing.wl().insert(*pid, data.to_vec());
        Ok(())
    }

    fn insert_tuple(
        &self,
        coordinator: &TxnCoordinator,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, CoreError> {
        if tuple.0.len() != self.layout.tuple_size {
            return Err(CoreError::db(format!(
                "tuple size {} does not match table tuple size {}",
                tuple.0.len(),
                self.layout.tuple_size
            )));
        }

        for index in 0..self.num_pages() {
            let pid = self.page_id(index);
            let page = coordinator.get_page(txn, pid, LockMode::Exclusive)?;
            let mut guard = page.wl();
            let mut bits = self.layout.read_bitmap(guard.data());
            if let Some(slot) = bits.iter().position(|occupied| !occupied) {
                bits.set(slot, true);
                self.layout.write_bitmap(guard.data_mut(), &bits);
                let range = self.layout.slot_range(slot);
                guard.data_mut()[range].copy_from_slice(&tuple.0);
                drop(guard);
                coordinator.mark_dirty(txn, pid)?;
                return Ok(vec![pid]);
            }
        }

        let pid = self.allocate_page();
        let page = coordinator.get_page(txn, pid, LockMode::Exclusive)?;
        let mut guard = page.wl();
        let mut bits = BitVec::from_elem(self.layout.num_slots, false);
        bits.set(0, true);
        self.layout.write_bitmap(guard.data_mut(), &bits);
        let range = self.layout.slot_range(0);
        guard.data_mut()[range].copy_from_slice(&tuple.0);
        drop(guard);
        coordinator.mark_dirty(txn, pid)?;
        Ok(vec![pid])
    }

    fn delete_tuple(
        &self,
        coordinator: &TxnCoordinator,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, CoreError> {
        for index in 0..self.num_pages() {
            let pid = self.page_id(index);
            let page = coordinator.get_page(txn, pid, LockMode::Exclusive)?;
            let mut guard = page.wl();
            let mut bits = self.layout.read_bitmap(guard.data());
            for slot in 0..self.layout.num_slots {
                if !bits[slot] {
                    continue;
                }
                let range = self.layout.slot_range(slot);
                if &guard.data()[range.clone()] == tuple.0.as_slice() {
                    bits.set(slot, false);
                    self.layout.write_bitmap(guard.data_mut(), &bits);
                    guard.data_mut()[range].fill(0);
                    drop(guard);
                    coordinator.mark_dirty(txn, pid)?;
                    return Ok(vec![pid]);
                }
            }
        }
        Err(CoreError::db("tuple not found"))
    }

    fn iterator<'a>(
        &'a self,
        coordinator: &'a TxnCoordinator,
        txn: TransactionId,
    ) -> Box<dyn Iterator<Item = Tuple> + 'a> {
        let mut out = Vec::new();
        for index in 0..self.num_pages() {
            let pid = self.page_id(index);
            let page = match coordinator.get_page(txn, pid, LockMode::Shared) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let guard = page.rl();
            let bits = self.layout.read_bitmap(guard.data());
            for slot in 0..self.layout.num_slots {
                if bits[slot] {
                    let range = self.layout.slot_range(slot);
                    out.push(Tuple(guard.data()[range].to_vec()));
                }
            }
        }
        Box::new(out.into_iter())
    }
}

/// A catalog backed by a fixed in-memory map from table id to heap file,
/// registered up front. No DDL, no schema metadata beyond tuple width
/// (`SPEC_FULL.md` §1 Non-goals).
pub struct InMemoryCatalog {
    tables: HashMap<TableId, Arc<HeapFile>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self { tables: HashMap::new() }
    }

    pub fn register(&mut self, table_id: TableId, tuple_size: usize) {
        self.tables.insert(table_id, Arc::new(HeapFile::new(table_id, tuple_size)));
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for InMemoryCatalog {
    fn file_for(&self, table_id: TableId) -> Result<Arc<dyn TableFile>, CoreError> {
        self.tables
            .get(&table_id)
            .cloned()
            .map(|f| f as Arc<dyn TableFile>)
            .ok_or_else(|| CoreError::db(format!("no such table: {}", table_id)))
    }
}
