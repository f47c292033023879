use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, RwLock},
};

use log::debug;

use crate::{
    collaborators::{Catalog, LogSink},
    error::CoreError,
    page::Page,
    page_id::PageId,
    transaction_id::TransactionId,
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

struct CacheInner {
    entries: HashMap<PageId, Pod<Page>>,
    /// Front = least recently touched, back = most recently touched.
    recency: VecDeque<PageId>,
}

impl CacheInner {
    fn touch(&mut self, pid: PageId) {
        self.recency.retain(|&p| p != pid);
        self.recency.push_back(pid);
    }

    /// Evict the least-recently-touched *clean* page. True LRU, scanning
    /// from the least-recently-touched end and skipping every dirty page:
    /// a deliberate departure from the reference implementation's
    /// most-recently-touched scan start, which the spec flags as a likely
    /// bug (`SPEC_FULL.md` §9) rather than something to silently port.
    fn evict_one(&mut self) -> Result<(), CoreError> {
        let candidate = self
            .recency
            .iter()
            .find(|pid| {
                self.entries
                    .get(pid)
                    .map(|p| !p.rl().is_dirty())
                    .unwrap_or(false)
            })
            .copied();

        match candidate {
            Some(pid) => {
                self.entries.remove(&pid);
                self.recency.retain(|&p| p != pid);
                debug!("evicted clean page {}", pid);
                Ok(())
            }
            None => Err(CoreError::CacheFull),
        }
    }
}

/// Bounded map from `PageId` to resident `Page`, implementing NO-STEAL
/// admission/eviction and FORCE flush. See `SPEC_FULL.md` §4.1.
pub struct PageCache {
    capacity: usize,
    catalog: Arc<dyn Catalog>,
    log: Arc<dyn LogSink>,
    inner: Mutex<CacheInner>,
}

impl PageCache {
    pub fn new(capacity: usize, catalog: Arc<dyn Catalog>, log: Arc<dyn LogSink>) -> Self {
        Self {
            capacity,
            catalog,
            log,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_resident(&self, pid: PageId) -> bool {
        self.inner.lock().unwrap().entries.contains_key(&pid)
    }

    /// If resident, return the shared handle. Otherwise evict a clean page
    /// if at capacity, read `pid` from its table file, and insert it with
    /// `before_image` stamped to the freshly read contents.
    pub fn admit(&self, pid: PageId) -> ResultPod<Page> {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(page) = inner.entries.get(&pid).cloned() {
                inner.touch(pid);
                return Ok(page);
            }
        }

        // Read from disk without holding the bookkeeping mutex, so faults
        // on distinct page ids can proceed concurrently.
        let file = self.catalog.file_for(pid.table_id)?;
        let data = file.read_page(&pid)?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(page) = inner.entries.get(&pid).cloned() {
            // Lost the race to a concurrent admit of the same page.
            inner.touch(pid);
            return Ok(page);
        }
        if inner.entries.len() >= self.capacity {
            inner.evict_one()?;
        }
        let page = Arc::new(RwLock::new(Page::from_disk(pid, data)));
        inner.entries.insert(pid, page.clone());
        inner.touch(pid);
        debug!("admitted page {} from disk", pid);
        Ok(page)
    }

    /// Mark the resident page `pid` dirty on behalf of `by` and refresh its
    /// recency. The page must already be resident (obtained via `admit`).
    pub fn put_dirty(&self, pid: PageId, by: TransactionId) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        let page = inner.entries.get(&pid).cloned().ok_or_else(|| {
            CoreError::db(format!("put_dirty: page {} is not resident", pid))
        })?;
        inner.touch(pid);
        drop(inner);
        page.wl().mark_dirty(by);
        Ok(())
    }

    /// If resident and dirty: write `(before_image, current)` to the log
    /// and force it, then write the page to its file, then clear the dirty
    /// bit. A no-op for non-dirty or non-resident pages.
    pub fn flush(&self, pid: PageId) -> Result<(), CoreError> {
        let page_pod = {
            let inner = self.inner.lock().unwrap();
            match inner.entries.get(&pid) {
                Some(p) => p.clone(),
                None => return Ok(()),
            }
        };

        let mut page = page_pod.wl();
        let dirtied_by = match page.dirtied_by() {
            Some(tx) => tx,
            None => return Ok(()),
        };

        self.log
            .write_log(dirtied_by, pid, page.before_image(), page.data())?;
        self.log.force()?;

        let file = self.catalog.file_for(pid.table_id)?;
        file.write_page(&pid, page.data())?;
        page.clear_dirty();
        debug!("flushed page {} (dirtied by {})", pid, dirtied_by);
        Ok(())
    }

    /// Flush every resident page. Used only outside eviction (e.g. an
    /// admin `flush_all_pages`, or a commit that flushes all of a
    /// transaction's dirty pages); never called as part of eviction, which
    /// must never force an uncommitted page to disk.
    pub fn flush_all(&self) -> Result<(), CoreError> {
        let pids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.entries.keys().copied().collect()
        };
        for pid in pids {
            self.flush(pid)?;
        }
        Ok(())
    }

    /// Remove `pid` without flushing. Used by abort and by page reuse.
    pub fn discard(&self, pid: PageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.remove(&pid);
        inner.recency.retain(|&p| p != pid);
    }

    /// If resident and `dirtied_by == Some(by)`, replace the page's
    /// contents with its before-image and clear the dirty bit.
    pub fn restore_before_image(&self, pid: PageId, by: TransactionId) {
        let page_pod = {
            let inner = self.inner.lock().unwrap();
            inner.entries.get(&pid).cloned()
        };
        if let Some(page_pod) = page_pod {
            let mut page = page_pod.wl();
            if page.dirtied_by() == Some(by) {
                page.restore_before_image();
            }
        }
    }

    /// `before_image := current contents`. Called after commit-flush.
    pub fn refresh_before_image(&self, pid: PageId) {
        let page_pod = {
            let inner = self.inner.lock().unwrap();
            inner.entries.get(&pid).cloned()
        };
        if let Some(page_pod) = page_pod {
            page_pod.wl().refresh_before_image();
        }
    }
}
