use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::LedgerStore;
use crate::reader::document::BatchDocument;
use crate::reader::error::ReaderError;

/// Produces normalized batch documents from a ledger store
///
/// Holds only a shared, read-only store handle, so one reader serves any
/// number of concurrent requests.
#[derive(Clone)]
pub struct BatchReader {
    store: Arc<dyn LedgerStore>,
}

impl BatchReader {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Read one batch and everything recorded against it
    ///
    /// # Flow
    /// 1. Reject malformed identifiers
    /// 2. Fetch the header; absent or inactive batches are `NotFound`
    /// 3. Fetch the four event streams concurrently and wait for all of them
    /// 4. Normalize everything into a `BatchDocument`
    ///
    /// Any failure aborts the read; a partial document is never returned.
    pub async fn read(&self, batch_id: &str) -> Result<BatchDocument, ReaderError> {
        validate_batch_id(batch_id)?;
        debug!("Reading batch {}", batch_id);

        let batch = match self.store.batch(batch_id).await? {
            Some(batch) if batch.is_active => batch,
            _ => return Err(ReaderError::NotFound(batch_id.to_string())),
        };
        if batch.batch_id != batch_id {
            return Err(ReaderError::Decode(format!(
                "store returned batch {:?} for {:?}",
                batch.batch_id, batch_id
            )));
        }

        let (processing, distribution, quality_tests, iot_data) = tokio::try_join!(
            self.store.processing_history(batch_id),
            self.store.distribution_history(batch_id),
            self.store.quality_tests(batch_id),
            self.store.iot_data(batch_id),
        )?;

        let document =
            BatchDocument::assemble(batch, processing, distribution, quality_tests, iot_data)?;
        info!(
            "Batch {} read: stage {}, {} processing, {} distribution, {} tests, {} readings",
            batch_id,
            document.stage_info.name,
            document.processing.len(),
            document.distribution.len(),
            document.quality_tests.len(),
            document.iot_data.len()
        );
        Ok(document)
    }
}

/// Identifiers must be non-blank, a single path segment, and free of control characters.
pub fn validate_batch_id(batch_id: &str) -> Result<(), ReaderError> {
    if batch_id.trim().is_empty() {
        return Err(ReaderError::InvalidInput("batch ID is required".to_string()));
    }
    if batch_id.contains('/') || batch_id.chars().any(char::is_control) {
        return Err(ReaderError::InvalidInput(format!(
            "batch ID {batch_id:?} contains invalid characters"
        )));
    }
    Ok(())
}
