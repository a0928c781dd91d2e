//! Index: one optional [`ColumnIndex`] per table column, with the primary
//! key always indexed (§4.4). Columns without an index fall back to a
//! linear scan performed by the caller (`Table`/`Query`), since the index
//! itself has no access to page storage.

use parking_lot::Mutex;

use crate::common::rid::{PageKind, Rid};

use super::column_index::ColumnIndex;

pub struct Index {
    key_column: usize,
    columns: Mutex<Vec<Option<ColumnIndex>>>,
}

impl Index {
    /// `num_columns` is `M`; the primary key column is indexed immediately.
    pub fn new(num_columns: usize, key_column: usize) -> Self {
        let mut columns = vec![None; num_columns];
        columns[key_column] = Some(ColumnIndex::new());
        Self {
            key_column,
            columns: Mutex::new(columns),
        }
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        self.columns.lock()[column].is_some()
    }

    /// `None` if `column` has no index (caller must fall back to a linear
    /// scan); `Some` with possibly-empty lists otherwise.
    pub fn locate(&self, column: usize, value: i64) -> Option<(Vec<Rid>, Vec<Rid>)> {
        self.columns.lock()[column].as_ref().map(|idx| idx.locate(value))
    }

    pub fn locate_range(&self, begin: i64, end: i64, column: usize) -> Option<Vec<(i64, Vec<Rid>, Vec<Rid>)>> {
        self.columns.lock()[column]
            .as_ref()
            .map(|idx| idx.value_in_range(begin, end))
    }

    /// Materialize an index on `column` from an already-scanned set of
    /// `(value, rid, kind)` triples (base records first, then tail).
    pub fn create_index(&self, column: usize, rows: impl Iterator<Item = (i64, Rid, PageKind)>) {
        let mut idx = ColumnIndex::new();
        for (value, rid, kind) in rows {
            idx.add(value, rid, kind);
        }
        self.columns.lock()[column] = Some(idx);
    }

    pub fn drop_index(&self, column: usize) {
        if column != self.key_column {
            self.columns.lock()[column] = None;
        }
    }

    /// Add `rid` to every indexed column's entry for its value in `columns`.
    pub fn insert_value(&self, columns: &[i64], rid: Rid, kind: PageKind) {
        let mut guard = self.columns.lock();
        for (col_idx, &value) in columns.iter().enumerate() {
            if let Some(idx) = guard[col_idx].as_mut() {
                idx.add(value, rid, kind);
            }
        }
    }

    pub fn update_index(&self, column: usize, value: i64, rid: Rid, kind: PageKind) {
        if let Some(idx) = self.columns.lock()[column].as_mut() {
            idx.add(value, rid, kind);
        }
    }

    /// Remove a single `(value, rid)` entry from one column's index,
    /// without touching the others. Used when a key-changing update is
    /// rolled back and the old key must be swapped back in for the new one.
    pub fn remove_value_rid(&self, column: usize, value: i64, rid: Rid) {
        if let Some(idx) = self.columns.lock()[column].as_mut() {
            idx.remove_rid(value, rid);
        }
    }

    pub fn remove_from_index(&self, rid: Rid, columns: &[i64]) {
        let mut guard = self.columns.lock();
        for (col_idx, &value) in columns.iter().enumerate() {
            if let Some(idx) = guard[col_idx].as_mut() {
                idx.remove_rid(value, rid);
            }
        }
    }

    /// Remove every RID recorded for `primary_key` from the primary-key
    /// index (used by `delete`).
    pub fn delete_value(&self, primary_key: i64) {
        if let Some(idx) = self.columns.lock()[self.key_column].as_mut() {
            idx.delete_value(primary_key);
        }
    }
}
