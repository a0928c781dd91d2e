//! Record-level locking: Strong-Strict 2PL with no-wait deadlock
//! prevention (§4.5, §5).

mod manager;

pub use manager::{LockManager, LockMode, TransactionId};
