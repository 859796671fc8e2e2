use crate::types::Stage;

/// Errors returned by ledger store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing ledger cannot be reached (RPC transport, pool exhausted, I/O).
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    /// A record came back in a shape that does not match its schema.
    #[error("malformed ledger record: {0}")]
    Decode(String),

    /// The store rejected the lookup because the batch does not exist.
    #[error("batch not found: {0}")]
    NotFound(String),

    #[error("batch already exists: {0}")]
    DuplicateBatch(String),

    #[error("unknown batch: {0}")]
    UnknownBatch(String),

    #[error("batch is no longer active: {0}")]
    InactiveBatch(String),

    #[error("batch {batch_id} cannot move from stage {current} back to {requested:?}")]
    StageRegression {
        batch_id: String,
        current: u8,
        requested: Stage,
    },

    /// Any other backend failure (SQL error, constraint violation, ...).
    #[error("ledger backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
