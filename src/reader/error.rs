use crate::ledger::StoreError;

/// Why a batch document could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("invalid batch identifier: {0}")]
    InvalidInput(String),

    /// No active batch exists under the identifier.
    #[error("batch not found: {0}")]
    NotFound(String),

    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(String),

    /// A record from the store failed validation; nothing is returned.
    #[error("malformed ledger record: {0}")]
    Decode(String),
}

impl From<StoreError> for ReaderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) | StoreError::Backend(msg) => {
                ReaderError::StoreUnavailable(msg)
            }
            StoreError::Decode(msg) => ReaderError::Decode(msg),
            StoreError::NotFound(id)
            | StoreError::UnknownBatch(id)
            | StoreError::InactiveBatch(id) => ReaderError::NotFound(id),
            // Write-side rejections never come back from a read.
            other @ (StoreError::DuplicateBatch(_) | StoreError::StageRegression { .. }) => {
                ReaderError::Decode(format!("unexpected store response: {other}"))
            }
        }
    }
}
