//! Query (§4.7): the only mutator of version chains. Every method mirrors
//! the source's falsy-on-failure contract — a lock denial, a missing row,
//! or a uniqueness violation all surface as `Ok(false)` / `Ok(None)` rather
//! than an `Err`, so a driving [`Transaction`](crate::txn::Transaction) can
//! treat them uniformly as "abort".

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::config::{NONE_RID, RID_COLUMN};
use crate::common::error::Result;
use crate::common::rid::{PageKind, Rid};
use crate::lock::LockMode;
use crate::storage::logical_page::RecordView;
use crate::table::Table;
use crate::txn::Transaction;

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// One materialized, version-resolved row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub rid: i64,
    pub columns: Vec<i64>,
}

#[derive(Clone)]
pub struct Query {
    table: Arc<Table>,
}

impl Query {
    pub fn new(table: Arc<Table>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    fn acquire(&self, rid: Rid, mode: LockMode, txn: Option<&Transaction>) -> bool {
        match txn {
            Some(t) => self.table.lock_manager().acquire(rid, mode, t.id()),
            None => true,
        }
    }

    /// Walk the tail chain starting at `indirection`, newest first.
    fn tail_chain(&self, indirection: i64) -> Result<Vec<RecordView>> {
        let mut chain = Vec::new();
        let mut cursor = indirection;
        while cursor != NONE_RID {
            let rec = self.table.page_range().read_tail(Rid::new(cursor))?;
            cursor = rec.indirection;
            chain.push(rec);
        }
        Ok(chain)
    }

    /// Reconstruct a base record's columns at `relative_version` (0 = latest,
    /// `-d` = `d` updates back) from its already-read base row and the tail
    /// chain hanging off it (§4.7 `select_version` steps 4-7).
    fn reconstruct(base: &RecordView, chain: &[RecordView], relative_version: i64) -> Vec<i64> {
        let mut result = base.columns.clone();
        if chain.is_empty() {
            return result;
        }
        let skip = if relative_version < 0 {
            (-relative_version) as usize
        } else {
            0
        };
        if skip >= chain.len() {
            return result;
        }
        for tail in chain[skip..].iter().rev() {
            for (i, value) in result.iter_mut().enumerate() {
                if (tail.schema_encoding >> i) & 1 == 1 {
                    *value = tail.columns[i];
                }
            }
        }
        result
    }

    /// §4.7 `insert`.
    pub fn insert(&self, columns: &[i64], txn: Option<&Transaction>) -> Result<bool> {
        let key_column = self.table.key_column();
        let primary_key = columns[key_column];
        if !self.table.locate_base(key_column, primary_key)?.is_empty() {
            return Ok(false);
        }

        let rid = self.table.page_range().insert_base(now_ts(), columns)?;

        if !self.acquire(rid, LockMode::Exclusive, txn) {
            return Ok(false);
        }
        if let Some(t) = txn {
            t.log_insert(Arc::clone(&self.table), rid);
        }

        self.table.index().insert_value(columns, rid, PageKind::Base);
        Ok(true)
    }

    /// §4.7 `select` — the `relative_version = 0` case of `select_version`.
    pub fn select(
        &self,
        search_key: i64,
        search_key_index: usize,
        projection: &[bool],
        txn: Option<&Transaction>,
    ) -> Result<Option<Vec<Record>>> {
        self.select_version(search_key, search_key_index, projection, 0, txn)
    }

    /// §4.7 `select_version`.
    pub fn select_version(
        &self,
        search_key: i64,
        search_key_index: usize,
        projection: &[bool],
        relative_version: i64,
        txn: Option<&Transaction>,
    ) -> Result<Option<Vec<Record>>> {
        let base_rids = self.table.locate_base(search_key_index, search_key)?;

        for &rid in &base_rids {
            if !self.acquire(rid, LockMode::Shared, txn) {
                return Ok(None);
            }
        }

        let mut out = Vec::new();
        for rid in base_rids {
            let base = self.table.page_range().read_base(rid)?;
            let chain = if base.indirection == NONE_RID {
                Vec::new()
            } else {
                self.tail_chain(base.indirection)?
            };
            let resolved = Self::reconstruct(&base, &chain, relative_version);

            if resolved[search_key_index] != search_key {
                continue;
            }

            let projected = resolved
                .iter()
                .zip(projection.iter())
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| *v)
                .collect();
            out.push(Record { rid: rid.0, columns: projected });
        }
        Ok(Some(out))
    }

    /// §4.7 `update`.
    pub fn update(&self, primary_key: i64, new_cols: &[Option<i64>], txn: Option<&Transaction>) -> Result<bool> {
        let key_column = self.table.key_column();
        let matches = self.table.locate_base(key_column, primary_key)?;
        if matches.len() != 1 {
            return Ok(false);
        }
        let rid = matches[0];

        let changes_key = matches!(new_cols[key_column], Some(new_key) if new_key != primary_key);
        if changes_key {
            let new_key = new_cols[key_column].unwrap();
            if !self.table.locate_base(key_column, new_key)?.is_empty() {
                return Ok(false);
            }
        }

        if !self.acquire(rid, LockMode::Exclusive, txn) {
            return Ok(false);
        }

        let base = self.table.page_range().read_base(rid)?;
        let old_indirection = base.indirection;
        let base_schema = base.schema_encoding;

        let mut updated_columns = base.columns.clone();
        if old_indirection != NONE_RID {
            let chain = self.tail_chain(old_indirection)?;
            let latest = Self::reconstruct(&base, &chain, 0);
            for (i, value) in updated_columns.iter_mut().enumerate() {
                if (base_schema >> i) & 1 == 1 {
                    *value = latest[i];
                }
            }
        }

        let mut updated_schema = base_schema;
        for (i, new_value) in new_cols.iter().enumerate() {
            if let Some(v) = new_value {
                updated_columns[i] = *v;
                updated_schema |= 1 << i;
            }
        }

        if let Some(t) = txn {
            t.log_update(
                Arc::clone(&self.table),
                rid,
                old_indirection,
                changes_key.then_some(primary_key),
            );
        }

        let tail_columns: Vec<Option<i64>> = updated_columns
            .iter()
            .enumerate()
            .map(|(i, &v)| if (updated_schema >> i) & 1 == 1 { Some(v) } else { None })
            .collect();
        let tail_rid = self
            .table
            .page_range()
            .append_tail(old_indirection, now_ts(), updated_schema, rid.0, &tail_columns)?;

        self.table.page_range().update_base_indirection(rid, tail_rid.0)?;
        self.table.page_range().update_base_schema_encoding(rid, updated_schema)?;

        if changes_key {
            let new_key = new_cols[key_column].unwrap();
            self.table.index().remove_value_rid(key_column, primary_key, rid);
            self.table.index().update_index(key_column, new_key, rid, PageKind::Base);
        }

        Ok(true)
    }

    /// §4.7 `sum` — the `relative_version = 0` case of `sum_version`.
    pub fn sum(&self, start_range: i64, end_range: i64, aggregate_column: usize, txn: Option<&Transaction>) -> Result<Option<i64>> {
        self.sum_version(start_range, end_range, aggregate_column, 0, txn)
    }

    /// §4.7 `sum_version`.
    pub fn sum_version(
        &self,
        start_range: i64,
        end_range: i64,
        aggregate_column: usize,
        relative_version: i64,
        txn: Option<&Transaction>,
    ) -> Result<Option<i64>> {
        let key_column = self.table.key_column();
        let Some(ranges) = self.table.index().locate_range(start_range, end_range, key_column) else {
            return Ok(Some(0));
        };

        let mut total = 0i64;
        for (_, base_rids, _tail_rids) in ranges {
            for rid in base_rids {
                if !self.acquire(rid, LockMode::Shared, txn) {
                    return Ok(None);
                }
                let base = self.table.page_range().read_base(rid)?;
                let chain = if base.indirection == NONE_RID {
                    Vec::new()
                } else {
                    self.tail_chain(base.indirection)?
                };
                let resolved = Self::reconstruct(&base, &chain, relative_version);
                total += resolved[aggregate_column];
            }
        }
        Ok(Some(total))
    }

    /// §4.7 `delete`.
    pub fn delete(&self, primary_key: i64, txn: Option<&Transaction>) -> Result<bool> {
        let key_column = self.table.key_column();
        let matches = self.table.locate_base(key_column, primary_key)?;
        if matches.is_empty() {
            return Ok(false);
        }
        let rid = matches[0];

        if !self.acquire(rid, LockMode::Exclusive, txn) {
            return Ok(false);
        }

        let base = self.table.page_range().read_base(rid)?;

        if let Some(t) = txn {
            t.log_delete(Arc::clone(&self.table), rid, base.columns.clone());
        }

        self.table.page_range().set_base_value(rid, RID_COLUMN, NONE_RID)?;
        self.table.index().delete_value(primary_key);
        Ok(true)
    }

    /// §4.7 `increment`.
    pub fn increment(&self, key: i64, column: usize, txn: Option<&Transaction>) -> Result<bool> {
        let key_column = self.table.key_column();
        let projection = vec![true; self.table.num_columns()];
        let Some(rows) = self.select(key, key_column, &projection, txn)? else {
            return Ok(false);
        };
        let Some(row) = rows.into_iter().next() else {
            return Ok(false);
        };

        let mut new_cols = vec![None; self.table.num_columns()];
        new_cols[column] = Some(row.columns[column] + 1);
        self.update(key, &new_cols, txn)
    }
}
