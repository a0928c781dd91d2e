//! Query layer: the mutating/versioned-read operations driven directly or
//! through a [`crate::txn::Transaction`].

#[allow(clippy::module_inception)]
mod query;

pub use query::{Query, Record};
