//! Transaction objects that compose query operations with undo-log-based
//! rollback (§4.9), and the worker that drives them across threads (§4.10).

#[allow(clippy::module_inception)]
mod transaction;
mod worker;

pub use transaction::Transaction;
pub use worker::{TransactionWorker, WorkerStats};
