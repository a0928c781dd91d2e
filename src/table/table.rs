//! Table (§4.6): owns the page range, the index, the lock manager, and a
//! background merge thread. Also hosts the rollback routines a
//! transaction's undo log replays on abort (§4.9).

use std::sync::Arc;

use crate::common::config::RID_COLUMN;
use crate::common::error::Result;
use crate::common::rid::{PageKind, Rid};
use crate::index::Index;
use crate::lock::LockManager;
use crate::storage::disk::TableDisk;

use super::merge::{self, MergeWorker};
use super::page_range::PageRange;

/// Default buffer pool capacity (logical pages) per table. The original
/// implementation hardcodes a small shared cache; this is generous enough
/// that typical tests never see an eviction, while still exercising the
/// eviction path when `merge`'s tail scan walks many pages.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

pub struct Table {
    name: String,
    num_columns: usize,
    key_column: usize,
    page_range: Arc<PageRange>,
    index: Index,
    lock_manager: LockManager,
    merge_worker: parking_lot::Mutex<Option<MergeWorker>>,
}

impl Table {
    pub fn new(name: impl Into<String>, table_root: impl Into<std::path::PathBuf>, num_columns: usize, key_column: usize) -> Self {
        let page_range = Arc::new(PageRange::new(
            num_columns,
            TableDisk::new(table_root.into()),
            DEFAULT_BUFFER_CAPACITY,
        ));
        let table = Self {
            name: name.into(),
            num_columns,
            key_column,
            page_range: Arc::clone(&page_range),
            index: Index::new(num_columns, key_column),
            lock_manager: LockManager::new(),
            merge_worker: parking_lot::Mutex::new(None),
        };
        table.start_merge_worker();
        table
    }

    /// Reopen a table whose record counts were persisted to the database's
    /// metadata file. The index is not itself persisted — it's rebuilt here
    /// from a scan of the key column.
    pub fn open(
        name: impl Into<String>,
        table_root: impl Into<std::path::PathBuf>,
        num_columns: usize,
        key_column: usize,
        num_base_records: i64,
        num_tail_records: i64,
    ) -> Result<Self> {
        let page_range = Arc::new(PageRange::open(
            num_columns,
            TableDisk::new(table_root.into()),
            DEFAULT_BUFFER_CAPACITY,
            num_base_records,
            num_tail_records,
        ));
        let table = Self {
            name: name.into(),
            num_columns,
            key_column,
            page_range: Arc::clone(&page_range),
            index: Index::new(num_columns, key_column),
            lock_manager: LockManager::new(),
            merge_worker: parking_lot::Mutex::new(None),
        };
        table.create_index(key_column)?;
        table.start_merge_worker();
        Ok(table)
    }

    fn start_merge_worker(&self) {
        let worker = MergeWorker::spawn(
            Arc::clone(&self.page_range),
            self.num_columns,
            crate::common::config::MERGE_PERIOD,
        );
        *self.merge_worker.lock() = Some(worker);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn page_range(&self) -> &PageRange {
        &self.page_range
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn num_base_records(&self) -> i64 {
        self.page_range.num_base_records()
    }

    pub fn num_tail_records(&self) -> i64 {
        self.page_range.num_tail_records()
    }

    /// Force a merge cycle outside the background thread's own schedule
    /// (used by tests, and by `update`'s optional threshold trigger).
    pub fn merge_now(&self) -> Result<()> {
        merge::merge(&self.page_range, self.num_columns)
    }

    /// Stop the merge thread and flush every resident page to disk.
    pub fn close(&self) -> Result<()> {
        if let Some(mut worker) = self.merge_worker.lock().take() {
            worker.stop();
        }
        self.page_range.save_to_disk()
    }

    /// Base-column linear scan for an unindexed column (§4.4).
    pub fn linear_scan_base(&self, column: usize, value: i64) -> Result<Vec<Rid>> {
        Ok(self
            .page_range
            .col_iterator(PageKind::Base, column)?
            .into_iter()
            .filter(|(_, v)| *v == value)
            .map(|(rid, _)| rid)
            .collect())
    }

    /// Resolve `column`'s base RIDs for `value`: the index if one exists,
    /// otherwise the linear-scan fallback (§4.4).
    pub fn locate_base(&self, column: usize, value: i64) -> Result<Vec<Rid>> {
        match self.index.locate(column, value) {
            Some((base, _tail)) => Ok(base),
            None => self.linear_scan_base(column, value),
        }
    }

    /// Build a secondary index on `column` by scanning every base record
    /// then every tail record for its current value (§4.4). Overwrites any
    /// existing index on the column.
    pub fn create_index(&self, column: usize) -> Result<()> {
        let base_rows = self.page_range.col_iterator(PageKind::Base, column)?;
        let tail_rows = self.page_range.col_iterator(PageKind::Tail, column)?;
        let rows = base_rows
            .into_iter()
            .map(|(rid, value)| (value, rid, PageKind::Base))
            .chain(tail_rows.into_iter().map(|(rid, value)| (value, rid, PageKind::Tail)));
        self.index.create_index(column, rows);
        Ok(())
    }

    /// Drop the secondary index on `column`, if any. A no-op on the primary
    /// key column, which is always indexed.
    pub fn drop_index(&self, column: usize) {
        self.index.drop_index(column);
    }

    // --- rollback routines (§4.9) ---

    /// Undo an `insert`: the only places RID slots are invalidated are
    /// these three rollback routines.
    pub fn rollback_insert(&self, rid: Rid) -> Result<()> {
        let rec = self.page_range.read_base(rid)?;
        self.index.remove_from_index(rid, &rec.columns);
        self.page_range.set_base_value(rid, RID_COLUMN, -1)?;
        self.page_range.update_base_indirection(rid, -1)?;
        Ok(())
    }

    /// Undo an `update`: restore the base's prior indirection, invalidate
    /// the tail record the update appended, and — if the update changed
    /// the primary key — swap the index entries back.
    pub fn rollback_update(&self, rid: Rid, old_indirection: i64, old_primary_key: Option<i64>) -> Result<()> {
        let base = self.page_range.read_base(rid)?;
        let tail_rid = Rid::new(base.indirection);

        if let Some(old_pk) = old_primary_key {
            let tail_rec = self.page_range.read_tail(tail_rid)?;
            let new_pk = tail_rec.columns[self.key_column];
            self.index.remove_value_rid(self.key_column, new_pk, rid);
            self.index.update_index(self.key_column, old_pk, rid, PageKind::Base);
        }

        self.page_range.update_base_indirection(rid, old_indirection)?;
        self.page_range.set_tail_value(tail_rid, RID_COLUMN, -1)?;
        Ok(())
    }

    /// Undo a `delete`: restore the base RID slot and reinsert the index
    /// entries captured before the delete ran.
    pub fn rollback_delete(&self, rid: Rid, old_columns: &[i64]) -> Result<()> {
        self.page_range.set_base_value(rid, RID_COLUMN, rid.0)?;
        self.index.insert_value(old_columns, rid, PageKind::Base);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rollback_insert_invalidates_slot_and_index() {
        let dir = tempdir().unwrap();
        let table = Table::new("t", dir.path().join("t"), 3, 0);
        let rid = table.page_range().insert_base(0, &[906659671, 93, 0]).unwrap();
        table.index().insert_value(&[906659671, 93, 0], rid, PageKind::Base);

        table.rollback_insert(rid).unwrap();

        assert_eq!(table.index().locate(0, 906659671), Some((vec![], vec![])));
        let rec = table.page_range().read_base(rid).unwrap();
        assert_eq!(rec.rid, -1);
        assert_eq!(rec.indirection, -1);
        table.close().unwrap();
    }

    #[test]
    fn rollback_delete_restores_slot_and_index() {
        let dir = tempdir().unwrap();
        let table = Table::new("t", dir.path().join("t"), 2, 0);
        let rid = table.page_range().insert_base(0, &[5, 10]).unwrap();
        table.index().insert_value(&[5, 10], rid, PageKind::Base);

        table.page_range().set_base_value(rid, RID_COLUMN, -1).unwrap();
        table.index().delete_value(5);

        table.rollback_delete(rid, &[5, 10]).unwrap();

        assert_eq!(table.page_range().read_base(rid).unwrap().rid, rid.0);
        assert_eq!(table.index().locate(0, 5), Some((vec![rid], vec![])));
        table.close().unwrap();
    }

    #[test]
    fn create_index_scans_base_and_tail_then_drop_index_falls_back_to_scan() {
        let dir = tempdir().unwrap();
        let table = Table::new("t", dir.path().join("t"), 2, 0);
        let r0 = table.page_range().insert_base(0, &[1, 100]).unwrap();
        let r1 = table.page_range().insert_base(0, &[2, 200]).unwrap();
        let tail_rid = table.page_range().append_tail(r1.0, 0, 0, r1.0, &[Some(2), Some(300)]).unwrap();
        table.page_range().update_base_indirection(r1, tail_rid.0).unwrap();

        assert!(!table.index().is_indexed(1));
        assert_eq!(table.locate_base(1, 200).unwrap(), vec![r1]);

        table.create_index(1).unwrap();
        assert!(table.index().is_indexed(1));
        assert_eq!(table.index().locate(1, 100), Some((vec![r0], vec![])));
        let (tail_base, tail_tail) = table.index().locate(1, 300).unwrap();
        assert!(tail_base.is_empty());
        assert_eq!(tail_tail.len(), 1);

        table.drop_index(1);
        assert!(!table.index().is_indexed(1));
        assert_eq!(table.locate_base(1, 100).unwrap(), vec![r0]);

        table.close().unwrap();
    }
}
