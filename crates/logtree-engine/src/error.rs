use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A symbolic label has no registry entry. Raised before any I/O; no
    /// record is ever opened for an unresolvable label set.
    #[error("unknown label: {0}")]
    UnknownLabel(String),

    /// The session has begun or finished closing.
    #[error("session is closing or closed")]
    SessionClosed,

    /// The record is no longer open for writes.
    #[error("record is closing or closed")]
    RecordClosed,

    /// The payload could not be converted to the declared data kind. Raised
    /// before any record is opened.
    #[error("cannot normalize payload: {0}")]
    Normalization(String),

    /// Underlying allocate/append/finalize failure, propagated unchanged.
    /// The engine never retries; retry policy belongs to the caller.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;
