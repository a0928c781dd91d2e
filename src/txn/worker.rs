//! Transaction worker (§4.10): drives a batch of transactions on a
//! dedicated thread, retrying each one until it commits. No-wait 2PL
//! guarantees retries are expected to eventually succeed under a fair
//! scheduler (§5) — there's no bound on retry count here, matching the
//! source's "retry indefinitely" contract.

use std::thread::{self, JoinHandle};

use super::transaction::Transaction;

/// Per-worker completion counters, recorded as each transaction finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub transactions_run: usize,
    pub total_retries: usize,
}

pub struct TransactionWorker {
    transactions: Vec<Transaction>,
    handle: Option<JoinHandle<WorkerStats>>,
    stats: Option<WorkerStats>,
}

impl TransactionWorker {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            handle: None,
            stats: None,
        }
    }

    pub fn add_transaction(&mut self, txn: Transaction) {
        self.transactions.push(txn);
    }

    /// Spawn the worker thread. Each queued transaction runs to commit
    /// before the next one starts; insertion order is preserved for
    /// transactions queued on the same worker.
    pub fn run(&mut self) {
        let transactions = std::mem::take(&mut self.transactions);
        self.handle = Some(thread::spawn(move || {
            let mut stats = WorkerStats::default();
            for txn in transactions {
                loop {
                    match txn.run() {
                        Ok(true) => break,
                        Ok(false) => {
                            stats.total_retries += 1;
                            thread::yield_now();
                            continue;
                        }
                        Err(err) => {
                            log::error!("transaction {} hit a fatal error: {err}", txn.id());
                            break;
                        }
                    }
                }
                stats.transactions_run += 1;
            }
            stats
        }));
    }

    /// Block until the worker thread finishes, returning its completion
    /// stats. Idempotent: calling `join` again after the first call just
    /// replays the cached stats.
    pub fn join(&mut self) -> WorkerStats {
        if let Some(handle) = self.handle.take() {
            self.stats = Some(handle.join().expect("transaction worker thread panicked"));
        }
        self.stats.unwrap_or_default()
    }
}

impl Default for TransactionWorker {
    fn default() -> Self {
        Self::new()
    }
}
