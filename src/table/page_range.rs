//! Page directory / page range (§4.3): RID allocation, page placement, and
//! column-wise reads/writes for one table. The current design uses exactly
//! one range per table, owning the whole base chain and the whole tail
//! chain.

use parking_lot::Mutex;

use crate::common::config::{
    BASE_RID_COLUMN, INDIRECTION_COLUMN, PAGE_CAPACITY, SCHEMA_ENCODING_COLUMN,
};
use crate::common::error::{Error, Result};
use crate::common::rid::{PageKind, Rid};
use crate::storage::disk::TableDisk;
use crate::storage::logical_page::{LogicalPage, RecordView};

use crate::buffer::{BufferPool, Evicted};

struct Inner {
    num_base_records: i64,
    num_tail_records: i64,
    pool: BufferPool,
}

/// Owns the ordered base and tail page sequences for one table, the RID
/// allocation counters, and the buffer pool that caches their pages.
///
/// The whole of `Inner` sits behind one mutex: §4.3 requires that RID
/// allocation and the page mutation it drives happen atomically together,
/// so no other insert can interleave onto the same slot.
pub struct PageRange {
    num_columns: usize,
    disk: TableDisk,
    inner: Mutex<Inner>,
}

impl PageRange {
    pub fn new(num_columns: usize, disk: TableDisk, buffer_capacity: usize) -> Self {
        Self {
            num_columns,
            disk,
            inner: Mutex::new(Inner {
                num_base_records: 0,
                num_tail_records: 0,
                pool: BufferPool::new(buffer_capacity),
            }),
        }
    }

    /// Reopen a range whose counters were already persisted to metadata;
    /// pages are loaded from disk lazily, on first touch.
    pub fn open(
        num_columns: usize,
        disk: TableDisk,
        buffer_capacity: usize,
        num_base_records: i64,
        num_tail_records: i64,
    ) -> Self {
        Self {
            num_columns,
            disk,
            inner: Mutex::new(Inner {
                num_base_records,
                num_tail_records,
                pool: BufferPool::new(buffer_capacity),
            }),
        }
    }

    pub fn num_base_records(&self) -> i64 {
        self.inner.lock().num_base_records
    }

    pub fn num_tail_records(&self) -> i64 {
        self.inner.lock().num_tail_records
    }

    fn expected_num_items(total: i64, page_idx: usize) -> usize {
        let start = page_idx * PAGE_CAPACITY;
        let total = total.max(0) as usize;
        if start >= total {
            0
        } else {
            (total - start).min(PAGE_CAPACITY)
        }
    }

    fn load_logical_page(&self, kind: PageKind, page_idx: usize, num_items: usize) -> Result<LogicalPage> {
        let mut page = LogicalPage::new(self.num_columns);
        if num_items > 0 {
            for col in 0..page.total_columns() {
                if self.disk.page_exists(col, kind, page_idx) {
                    let physical = self.disk.load_page(col, kind, page_idx, num_items)?;
                    page.replace_physical_page(col, physical);
                }
            }
        }
        Ok(page)
    }

    fn flush_logical_page(&self, kind: PageKind, page_idx: usize, page: &LogicalPage) -> Result<()> {
        for col in 0..page.total_columns() {
            self.disk.save_page(col, kind, page_idx, page.physical_page(col))?;
        }
        Ok(())
    }

    fn flush_evicted(&self, inner: &Inner, evicted: Evicted) -> Result<()> {
        inner
            .pool
            .stats
            .pages_written
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.flush_logical_page(evicted.kind, evicted.page_index, &evicted.page)
    }

    /// Look up a page that [`ensure_resident`](Self::ensure_resident) was
    /// just called for. A miss here means the buffer pool evicted the page
    /// it had just admitted, which would mean `capacity` dropped to zero or
    /// `put` and `get` disagree on what's resident — an internal invariant,
    /// not a recoverable condition the caller can retry around.
    fn resident<'a>(&self, inner: &'a mut Inner, kind: PageKind, page_idx: usize) -> Result<&'a LogicalPage> {
        inner.pool.get(page_idx, kind).ok_or_else(|| {
            Error::Invariant(format!("page {page_idx} ({kind:?}) missing from pool right after ensure_resident"))
        })
    }

    fn resident_mut<'a>(&self, inner: &'a mut Inner, kind: PageKind, page_idx: usize) -> Result<&'a mut LogicalPage> {
        inner.pool.get_mut(page_idx, kind).ok_or_else(|| {
            Error::Invariant(format!("page {page_idx} ({kind:?}) missing from pool right after ensure_resident"))
        })
    }

    fn ensure_resident(&self, inner: &mut Inner, kind: PageKind, page_idx: usize) -> Result<()> {
        if inner.pool.contains(page_idx, kind) {
            return Ok(());
        }
        let total = match kind {
            PageKind::Base => inner.num_base_records,
            PageKind::Tail => inner.num_tail_records,
        };
        let num_items = Self::expected_num_items(total, page_idx);
        let page = self.load_logical_page(kind, page_idx, num_items)?;
        inner.pool.stats.pages_read.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Some(evicted) = inner.pool.put(page_idx, kind, page) {
            self.flush_evicted(inner, evicted)?;
        }
        Ok(())
    }

    pub fn insert_base(&self, timestamp: i64, columns: &[i64]) -> Result<Rid> {
        let mut inner = self.inner.lock();
        let rid = inner.num_base_records;
        let (page_idx, slot_idx) = Rid::new(rid).locate();
        self.ensure_resident(&mut inner, PageKind::Base, page_idx)?;
        let page = self.resident_mut(&mut inner, PageKind::Base, page_idx)?;
        let written_slot = page.insert_base_record(rid, timestamp, columns)?;
        debug_assert_eq!(written_slot, slot_idx);
        inner.num_base_records += 1;
        Ok(Rid::new(rid))
    }

    pub fn append_tail(
        &self,
        indirection: i64,
        timestamp: i64,
        schema_encoding: i64,
        base_rid: i64,
        columns: &[Option<i64>],
    ) -> Result<Rid> {
        let mut inner = self.inner.lock();
        let rid = inner.num_tail_records;
        let (page_idx, slot_idx) = Rid::new(rid).locate();
        self.ensure_resident(&mut inner, PageKind::Tail, page_idx)?;
        let page = self.resident_mut(&mut inner, PageKind::Tail, page_idx)?;
        let written_slot =
            page.append_tail_record(rid, indirection, timestamp, schema_encoding, base_rid, columns)?;
        debug_assert_eq!(written_slot, slot_idx);
        inner.num_tail_records += 1;
        Ok(Rid::new(rid))
    }

    pub fn read_base(&self, rid: Rid) -> Result<RecordView> {
        let mut inner = self.inner.lock();
        let (page_idx, slot_idx) = rid.locate();
        self.ensure_resident(&mut inner, PageKind::Base, page_idx)?;
        self.resident(&mut inner, PageKind::Base, page_idx)?.read_record(slot_idx)
    }

    pub fn read_tail(&self, rid: Rid) -> Result<RecordView> {
        let mut inner = self.inner.lock();
        let (page_idx, slot_idx) = rid.locate();
        self.ensure_resident(&mut inner, PageKind::Tail, page_idx)?;
        self.resident(&mut inner, PageKind::Tail, page_idx)?.read_record(slot_idx)
    }

    fn set_value(&self, kind: PageKind, rid: Rid, column: usize, value: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let (page_idx, slot_idx) = rid.locate();
        self.ensure_resident(&mut inner, kind, page_idx)?;
        self.resident_mut(&mut inner, kind, page_idx)?.set_value(slot_idx, column, value)
    }

    pub fn set_base_value(&self, rid: Rid, column: usize, value: i64) -> Result<()> {
        self.set_value(PageKind::Base, rid, column, value)
    }

    pub fn set_tail_value(&self, rid: Rid, column: usize, value: i64) -> Result<()> {
        self.set_value(PageKind::Tail, rid, column, value)
    }

    pub fn update_base_indirection(&self, rid: Rid, value: i64) -> Result<()> {
        self.set_base_value(rid, INDIRECTION_COLUMN, value)
    }

    pub fn update_base_schema_encoding(&self, rid: Rid, value: i64) -> Result<()> {
        self.set_base_value(rid, SCHEMA_ENCODING_COLUMN, value)
    }

    pub fn update_base_tsp(&self, rid: Rid, value: i64) -> Result<()> {
        self.set_base_value(rid, BASE_RID_COLUMN, value)
    }

    /// Every non-invalidated `(rid, value)` pair for `column` in `kind`'s
    /// space, in allocation order. Used both to materialize a fresh index
    /// (base then tail) and as the linear-scan fallback for unindexed
    /// columns (base only, per §4.4).
    pub fn col_iterator(&self, kind: PageKind, column: usize) -> Result<Vec<(Rid, i64)>> {
        let mut inner = self.inner.lock();
        let total = match kind {
            PageKind::Base => inner.num_base_records,
            PageKind::Tail => inner.num_tail_records,
        };
        if total <= 0 {
            return Ok(Vec::new());
        }
        let num_pages = ((total - 1) as usize) / PAGE_CAPACITY + 1;
        let mut out = Vec::new();
        for page_idx in 0..num_pages {
            self.ensure_resident(&mut inner, kind, page_idx)?;
            let page = self.resident(&mut inner, kind, page_idx)?;
            for slot in 0..page.num_records() {
                let rec = page.read_record(slot)?;
                if rec.rid >= 0 {
                    out.push((Rid::new(rec.rid), rec.columns[column]));
                }
            }
        }
        Ok(out)
    }

    /// Tail records, newest allocated first, from at most `max_pages` of the
    /// newest tail pages (§4.8 step 1, §6 "tail-pages-per-merge budget").
    /// Bounding the scan to the newest pages is sufficient for
    /// newest-tail-wins consolidation: any base record whose latest update
    /// falls outside the scanned window is simply left for a later merge
    /// cycle, since the background thread keeps calling this while
    /// `num_tail_records > 0`.
    pub fn tail_records_newest_first(&self, max_pages: usize) -> Result<Vec<RecordView>> {
        let mut inner = self.inner.lock();
        let total = inner.num_tail_records;
        if total <= 0 {
            return Ok(Vec::new());
        }
        let num_pages = ((total - 1) as usize) / PAGE_CAPACITY + 1;
        let first_page = num_pages.saturating_sub(max_pages.max(1));
        let mut out = Vec::new();
        for page_idx in (first_page..num_pages).rev() {
            self.ensure_resident(&mut inner, PageKind::Tail, page_idx)?;
            let page = self.resident(&mut inner, PageKind::Tail, page_idx)?;
            for slot in (0..page.num_records()).rev() {
                out.push(page.read_record(slot)?);
            }
        }
        Ok(out)
    }

    /// Access the physical page backing one base column at `page_idx`,
    /// materializing it resident first. Used by the merge worker, which
    /// deep-copies, mutates, and writes the copy back via
    /// [`PageRange::replace_base_column`].
    pub fn base_column_snapshot(&self, page_idx: usize, column: usize) -> Result<crate::storage::physical_page::PhysicalPage> {
        let mut inner = self.inner.lock();
        self.ensure_resident(&mut inner, PageKind::Base, page_idx)?;
        Ok(self.resident(&mut inner, PageKind::Base, page_idx)?.physical_page(column).clone())
    }

    pub fn replace_base_column(
        &self,
        page_idx: usize,
        column: usize,
        physical: crate::storage::physical_page::PhysicalPage,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_resident(&mut inner, PageKind::Base, page_idx)?;
        inner.pool.set_column(page_idx, PageKind::Base, column, physical);
        Ok(())
    }

    /// Flush every resident page to disk (table close / checkpoint).
    pub fn save_to_disk(&self) -> Result<()> {
        let inner = self.inner.lock();
        for (kind, page_idx, page) in inner.pool.iter() {
            self.flush_logical_page(kind, page_idx, page)?;
        }
        Ok(())
    }
}
