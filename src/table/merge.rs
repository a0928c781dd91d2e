//! Merge — background consolidation of tail records into base-column
//! images (§4.8).
//!
//! For each user column independently, the newest tail value per base RID
//! wins; once every column has been resolved for a base record, that
//! record's `INDIRECTION` and `SCHEMA_ENCODING` reset to their canonical
//! "no pending tail" values. No tail record is ever deleted — reclaiming
//! tail storage is an explicitly unimplemented follow-up (§9 "tail GC").

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::common::config::{MERGE_TAIL_PAGE_BUDGET, NONE_RID, USER_COLUMN_START};
use crate::common::error::Result;
use crate::common::rid::Rid;

use super::page_range::PageRange;

/// Runs one merge pass over every user column, scanning at most
/// [`MERGE_TAIL_PAGE_BUDGET`] of the newest tail pages so a single cycle
/// can't stall query threads behind an unbounded scan (§6). Safe to call
/// with no pending tail records (a no-op). Since the background worker
/// re-invokes this every [`MERGE_PERIOD`](crate::common::config::MERGE_PERIOD)
/// while tail records remain, a backlog beyond the budget is simply
/// consolidated across several cycles rather than one.
pub fn merge(page_range: &PageRange, num_user_columns: usize) -> Result<()> {
    if page_range.num_tail_records() <= 0 {
        return Ok(());
    }

    let tail_records = page_range.tail_records_newest_first(MERGE_TAIL_PAGE_BUDGET)?;

    // The merge cursor for a base record is the newest tail record that
    // targets it at all, independent of which column that tail touched.
    let mut newest_tail_for_base: HashMap<i64, i64> = HashMap::new();
    for rec in &tail_records {
        if rec.base_rid >= 0 {
            newest_tail_for_base.entry(rec.base_rid).or_insert(rec.rid);
        }
    }

    let mut consolidated: HashSet<i64> = HashSet::new();

    for col in 0..num_user_columns {
        let bit = 1i64 << col;
        let mut updated_in_c: HashSet<i64> = HashSet::new();
        let mut dirty_pages: HashMap<usize, crate::storage::physical_page::PhysicalPage> = HashMap::new();

        for rec in &tail_records {
            let base_rid = rec.base_rid;
            if base_rid < 0 || updated_in_c.contains(&base_rid) {
                continue;
            }
            if rec.schema_encoding & bit == 0 {
                continue;
            }
            let (page_idx, slot_idx) = Rid::new(base_rid).locate();
            let physical = match dirty_pages.get_mut(&page_idx) {
                Some(p) => p,
                None => {
                    let snapshot = page_range.base_column_snapshot(page_idx, USER_COLUMN_START + col)?;
                    dirty_pages.entry(page_idx).or_insert(snapshot)
                }
            };
            physical.update(slot_idx, rec.columns[col])?;
            updated_in_c.insert(base_rid);
            consolidated.insert(base_rid);
        }

        for (page_idx, physical) in dirty_pages {
            page_range.replace_base_column(page_idx, USER_COLUMN_START + col, physical)?;
        }
    }

    for base_rid in consolidated {
        let rid = Rid::new(base_rid);
        page_range.update_base_indirection(rid, NONE_RID)?;
        page_range.update_base_schema_encoding(rid, 0)?;
        if let Some(&tail_rid) = newest_tail_for_base.get(&base_rid) {
            page_range.update_base_tsp(rid, tail_rid)?;
        }
    }

    Ok(())
}

/// Background thread that wakes every [`MERGE_PERIOD`](crate::common::config::MERGE_PERIOD)
/// and runs [`merge`] whenever tail records are pending. Joined on table
/// close.
pub struct MergeWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MergeWorker {
    pub fn spawn(page_range: Arc<PageRange>, num_user_columns: usize, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(period);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(err) = merge(&page_range, num_user_columns) {
                    log::warn!("merge cycle failed: {err}");
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MergeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::TableDisk;
    use tempfile::tempdir;

    fn make_range(dir: &std::path::Path, num_columns: usize) -> PageRange {
        PageRange::new(num_columns, TableDisk::new(dir.join("t")), 32)
    }

    /// Mirrors the scenario in the original reference implementation's
    /// merge test: three base rows, five interleaved tail updates across
    /// two columns, then a single merge pass.
    #[test]
    fn merge_keeps_newest_value_per_column_and_sets_cursor() {
        let dir = tempdir().unwrap();
        let pr = make_range(dir.path(), 3);

        let bases = [[100, 10, 1000], [101, 11, 1001], [102, 12, 1002]];
        for row in bases {
            pr.insert_base(0, &row).unwrap();
        }

        let mut append = |base_rid: i64, col: usize, value: i64| {
            let mut cols = [None, None, None];
            cols[col] = Some(value);
            let schema = 1i64 << col;
            pr.append_tail(NONE_RID, 0, schema, base_rid, &cols).unwrap()
        };

        append(0, 0, 1000);
        append(1, 2, 3001);
        append(2, 0, 2002);
        let last0 = append(0, 2, 9000);
        let last1 = append(1, 0, 7001);

        merge(&pr, 3).unwrap();

        let r0 = pr.read_base(Rid::new(0)).unwrap();
        assert_eq!(r0.columns, vec![1000, 10, 9000]);
        assert_eq!(r0.indirection, NONE_RID);
        assert_eq!(r0.schema_encoding, 0);
        assert_eq!(r0.base_rid, last0.0);

        let r1 = pr.read_base(Rid::new(1)).unwrap();
        assert_eq!(r1.columns, vec![7001, 11, 3001]);
        assert_eq!(r1.base_rid, last1.0);

        let r2 = pr.read_base(Rid::new(2)).unwrap();
        assert_eq!(r2.columns, vec![2002, 12, 1002]);
    }

    #[test]
    fn merge_with_no_tail_records_is_a_no_op() {
        let dir = tempdir().unwrap();
        let pr = make_range(dir.path(), 2);
        pr.insert_base(0, &[1, 2]).unwrap();
        merge(&pr, 2).unwrap();
        let rec = pr.read_base(Rid::new(0)).unwrap();
        assert_eq!(rec.columns, vec![1, 2]);
    }
}
