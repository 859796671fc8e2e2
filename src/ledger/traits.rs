use async_trait::async_trait;
use ethers::types::Address;

use crate::ledger::error::{StoreError, StoreResult};
use crate::types::{
    Batch, DistributionStep, IotReading, NewBatch, ProcessingStep, QualityTest, Stage,
};

/// Read side of the batch ledger.
///
/// Every stream is keyed by batch identifier. Child lists come back in append
/// order. Implementations must never substitute defaults for fields they
/// cannot decode: a malformed record is a `StoreError::Decode`.
///
/// Records are immutable once appended, so concurrent reads never conflict.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Fetch a batch header. `Ok(None)` if no batch was ever created under `batch_id`.
    async fn batch(&self, batch_id: &str) -> StoreResult<Option<Batch>>;

    async fn processing_history(&self, batch_id: &str) -> StoreResult<Vec<ProcessingStep>>;

    async fn distribution_history(&self, batch_id: &str) -> StoreResult<Vec<DistributionStep>>;

    async fn quality_tests(&self, batch_id: &str) -> StoreResult<Vec<QualityTest>>;

    async fn iot_data(&self, batch_id: &str) -> StoreResult<Vec<IotReading>>;
}

/// Append side of the batch ledger.
///
/// Mirrors the contract's mutating functions. Appending a processing or
/// distribution step advances the batch's stage to at least the matching
/// phase; the stage never moves backwards.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn create_batch(&self, batch: NewBatch, farmer: Address) -> StoreResult<()>;

    async fn add_processing_step(&self, batch_id: &str, step: ProcessingStep) -> StoreResult<()>;

    async fn add_distribution_step(
        &self,
        batch_id: &str,
        step: DistributionStep,
    ) -> StoreResult<()>;

    async fn add_quality_test(&self, batch_id: &str, test: QualityTest) -> StoreResult<()>;

    async fn add_iot_reading(&self, batch_id: &str, reading: IotReading) -> StoreResult<()>;

    /// Explicit lifecycle transition (e.g. to Retail or Consumer).
    ///
    /// Moving to the current stage is a no-op; moving backwards is rejected.
    async fn advance_stage(&self, batch_id: &str, stage: Stage) -> StoreResult<()>;

    async fn deactivate_batch(&self, batch_id: &str) -> StoreResult<()>;
}

/// Stage a batch ends up in after an append of the given category.
pub(crate) fn stage_after_append(current: u8, reached: Stage) -> u8 {
    current.max(reached.index())
}

/// Validate an explicit transition and return the new stage index.
pub(crate) fn checked_transition(batch_id: &str, current: u8, requested: Stage) -> StoreResult<u8> {
    if requested.index() < current {
        return Err(StoreError::StageRegression {
            batch_id: batch_id.to_string(),
            current,
            requested,
        });
    }
    Ok(requested.index())
}

/// Appends are only accepted on active batches.
pub(crate) fn ensure_active(batch: &Batch) -> StoreResult<()> {
    if !batch.is_active {
        return Err(StoreError::InactiveBatch(batch.batch_id.clone()));
    }
    Ok(())
}
