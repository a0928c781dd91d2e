//! lstore — an in-process, columnar, multi-version OLTP storage engine.
//!
//! Implements the L-Store design: a base/tail page layout with an
//! indirection chain that preserves prior versions, a buffer pool that
//! pages data on and off disk, secondary indexes over the primary key and
//! optional user columns, Strong-Strict two-phase locking with no-wait
//! deadlock prevention, transactions with undo-log rollback, and a
//! background merge worker that consolidates tail updates into base
//! records.
//!
//! # Layers, leaves first
//! - [`common`] — layout constants, the shared `Error`/`Result`, RIDs
//! - [`storage`] — physical pages, logical pages, per-table disk layout
//! - [`buffer`] — the LRU cache of resident logical pages
//! - [`index`] — per-column ordered maps from value to RIDs
//! - [`lock`] — per-RID shared/exclusive locks, no-wait
//! - [`table`] — page range (RID allocation), merge, and the `Table` façade
//! - [`query`] — insert/select/update/delete/sum, version-chain traversal
//! - [`txn`] — `Transaction` (2PL + undo) and `TransactionWorker`
//! - [`db`] — `Database`: maps table names to on-disk directories
//!
//! # Quick start
//! ```no_run
//! use lstore::db::Database;
//! use lstore::query::Query;
//!
//! let db = Database::open("/tmp/my_lstore_db").unwrap();
//! let table = db.create_table("grades", 5, 0).unwrap();
//! let query = Query::new(table);
//!
//! query.insert(&[906659671, 93, 0, 0, 0], None).unwrap();
//! let rows = query.select(906659671, 0, &[true; 5], None).unwrap().unwrap();
//! assert_eq!(rows[0].columns, vec![906659671, 93, 0, 0, 0]);
//!
//! db.close().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod db;
pub mod index;
pub mod lock;
pub mod query;
pub mod storage;
pub mod table;
pub mod txn;

pub use common::config::PAGE_SIZE;
pub use common::error::{Error, Result};
pub use common::rid::{PageKind, Rid};
pub use db::Database;
pub use query::{Query, Record};
pub use table::Table;
pub use txn::{Transaction, TransactionWorker};
