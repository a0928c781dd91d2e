//! Transaction (§4.9): Strong-Strict two-phase locking. Queries run in
//! insertion order, acquiring locks as they go and holding them until the
//! transaction ends; a lock-acquisition failure anywhere triggers an
//! immediate abort and LIFO replay of the undo log.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::error::Result;
use crate::common::rid::Rid;
use crate::lock::TransactionId;
use crate::table::Table;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

enum UndoOp {
    Insert {
        rid: Rid,
    },
    Update {
        rid: Rid,
        old_indirection: i64,
        old_primary_key: Option<i64>,
    },
    Delete {
        rid: Rid,
        old_columns: Vec<i64>,
    },
}

struct LogEntry {
    table: Arc<Table>,
    op: UndoOp,
}

type BoxedQuery = Box<dyn Fn(&Transaction) -> Result<bool> + Send>;

/// Composes a sequence of mutating query calls and runs them under 2PL.
/// Not `Sync` — a transaction is driven by exactly one thread at a time
/// (see [`crate::txn::TransactionWorker`]), though it can be moved onto
/// that thread.
pub struct Transaction {
    id: TransactionId,
    queries: RefCell<Vec<BoxedQuery>>,
    log: RefCell<Vec<LogEntry>>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            queries: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Queue a query call. `f` receives `self` so it can acquire locks and
    /// append undo entries; it returns `Ok(false)` to signal the caller
    /// should abort, mirroring a query's falsy-return contract.
    pub fn add_query<F>(&self, f: F)
    where
        F: Fn(&Transaction) -> Result<bool> + Send + 'static,
    {
        self.queries.borrow_mut().push(Box::new(f));
    }

    pub(crate) fn log_insert(&self, table: Arc<Table>, rid: Rid) {
        self.log.borrow_mut().push(LogEntry {
            table,
            op: UndoOp::Insert { rid },
        });
    }

    pub(crate) fn log_update(
        &self,
        table: Arc<Table>,
        rid: Rid,
        old_indirection: i64,
        old_primary_key: Option<i64>,
    ) {
        self.log.borrow_mut().push(LogEntry {
            table,
            op: UndoOp::Update {
                rid,
                old_indirection,
                old_primary_key,
            },
        });
    }

    pub(crate) fn log_delete(&self, table: Arc<Table>, rid: Rid, old_columns: Vec<i64>) {
        self.log.borrow_mut().push(LogEntry {
            table,
            op: UndoOp::Delete { rid, old_columns },
        });
    }

    /// Run every queued query in insertion order. Returns `Ok(true)` on
    /// commit, `Ok(false)` after a full rollback on abort. Safe to call
    /// repeatedly on the same transaction — the transaction worker retries
    /// an aborted transaction by calling `run()` again from scratch.
    pub fn run(&self) -> Result<bool> {
        for query in self.queries.borrow().iter() {
            if !query(self)? {
                return self.abort();
            }
        }
        self.commit()
    }

    fn abort(&self) -> Result<bool> {
        let entries: Vec<LogEntry> = self.log.borrow_mut().drain(..).collect();

        let mut touched: Vec<Arc<Table>> = Vec::new();
        for entry in &entries {
            if !touched.iter().any(|t| Arc::ptr_eq(t, &entry.table)) {
                touched.push(Arc::clone(&entry.table));
            }
        }

        for entry in entries.into_iter().rev() {
            match entry.op {
                UndoOp::Insert { rid } => entry.table.rollback_insert(rid)?,
                UndoOp::Update {
                    rid,
                    old_indirection,
                    old_primary_key,
                } => entry.table.rollback_update(rid, old_indirection, old_primary_key)?,
                UndoOp::Delete { rid, old_columns } => entry.table.rollback_delete(rid, &old_columns)?,
            }
        }

        for table in touched {
            table.lock_manager().release_all(self.id);
        }
        Ok(false)
    }

    fn commit(&self) -> Result<bool> {
        let log = self.log.borrow();
        let mut touched: Vec<Arc<Table>> = Vec::new();
        for entry in log.iter() {
            if !touched.iter().any(|t| Arc::ptr_eq(t, &entry.table)) {
                touched.push(Arc::clone(&entry.table));
            }
        }
        drop(log);

        for table in touched {
            table.lock_manager().release_all(self.id);
        }
        self.log.borrow_mut().clear();
        Ok(true)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use tempfile::tempdir;

    #[test]
    fn commit_releases_locks_and_persists_the_insert() {
        let dir = tempdir().unwrap();
        let table = Arc::new(Table::new("grades", dir.path().join("grades"), 5, 0));
        let query = Query::new(Arc::clone(&table));

        let txn = Transaction::new();
        txn.add_query({
            let query = query.clone();
            move |t| query.insert(&[906659671, 93, 0, 0, 0], Some(t))
        });

        assert!(txn.run().unwrap());
        assert_eq!(table.index().locate(0, 906659671).unwrap().0.len(), 1);
        table.close().unwrap();
    }

    /// S3: an insert that never commits leaves no observable trace — the
    /// key is absent from the index and the base slot it claimed is
    /// invalidated.
    #[test]
    fn aborted_insert_leaves_no_observable_state() {
        let dir = tempdir().unwrap();
        let table = Arc::new(Table::new("grades", dir.path().join("grades"), 5, 0));
        let query = Query::new(Arc::clone(&table));

        let txn = Transaction::new();
        txn.add_query({
            let query = query.clone();
            move |t| query.insert(&[906659671, 93, 0, 0, 0], Some(t))
        });
        // force an abort: queue a second query that always reports failure
        txn.add_query(|_| Ok(false));

        assert!(!txn.run().unwrap());
        assert_eq!(table.index().locate(0, 906659671).unwrap().0.len(), 0);
        assert!(query.select(906659671, 0, &[true; 5], None).unwrap().unwrap().is_empty());

        let rid = Rid::new(0);
        let rec = table.page_range().read_base(rid).unwrap();
        assert_eq!(rec.rid, -1);
        assert_eq!(rec.indirection, -1);
        table.close().unwrap();
    }

    #[test]
    fn conflicting_update_aborts_and_rolls_back() {
        let dir = tempdir().unwrap();
        let table = Arc::new(Table::new("grades", dir.path().join("grades"), 5, 0));
        let query = Query::new(Arc::clone(&table));
        query.insert(&[1, 10, 0, 0, 0], None).unwrap();

        let rid = table.index().locate(0, 1).unwrap().0[0];
        assert!(table.lock_manager().acquire(rid, crate::lock::LockMode::Exclusive, 999));

        let txn = Transaction::new();
        txn.add_query({
            let query = query.clone();
            move |t| query.update(1, &[None, Some(99), None, None, None], Some(t))
        });

        assert!(!txn.run().unwrap());
        table.lock_manager().release_all(999);
        table.close().unwrap();
    }
}
