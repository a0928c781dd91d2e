//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the storage engine.
///
/// Query-level failures ((a) missing row, (b) uniqueness violation,
/// (c) lock denial, (d) capacity/I-O) are deliberately recoverable: callers
/// at the query layer convert them into a falsy result so the enclosing
/// transaction can abort and retry. [`Error::Invariant`] is the one variant
/// that should propagate as a genuine fault.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no record found for key {0}")]
    NotFound(i64),

    #[error("primary key {0} already exists")]
    UniquenessViolation(i64),

    #[error("lock denied for rid {0}")]
    LockDenied(i64),

    #[error("page is full")]
    PageFull,

    #[error("slot index {0} out of range")]
    SlotOutOfRange(usize),

    #[error("no table named '{0}'")]
    NoSuchTable(String),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
