//! In-memory ledger
//!
//! Holds every batch and its four event streams in a single map behind a
//! tokio `RwLock`. Used for tests and for running the API without a chain.

use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ledger::error::{StoreError, StoreResult};
use crate::ledger::traits::{
    checked_transition, ensure_active, stage_after_append, LedgerStore, LedgerWriter,
};
use crate::types::{
    Batch, DistributionStep, IotReading, NewBatch, ProcessingStep, QualityTest, Stage,
};

/// Everything recorded for one batch
#[derive(Debug, Clone)]
struct BatchRecord {
    header: Batch,
    processing: Vec<ProcessingStep>,
    distribution: Vec<DistributionStep>,
    quality_tests: Vec<QualityTest>,
    iot_data: Vec<IotReading>,
}

impl BatchRecord {
    fn new(header: Batch) -> Self {
        Self {
            header,
            processing: Vec::new(),
            distribution: Vec::new(),
            quality_tests: Vec::new(),
            iot_data: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    batches: Arc<RwLock<HashMap<String, BatchRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a header exactly as recorded by another ledger.
    ///
    /// Unlike `create_batch`, the stage, farmer and active flag are taken
    /// verbatim. Identifier collisions are still rejected.
    pub async fn import_batch(&self, header: Batch) -> StoreResult<()> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&header.batch_id) {
            return Err(StoreError::DuplicateBatch(header.batch_id));
        }
        batches.insert(header.batch_id.clone(), BatchRecord::new(header));
        Ok(())
    }

    /// Run `append` against an active batch while holding the write lock.
    async fn append<F>(&self, batch_id: &str, append: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BatchRecord) -> StoreResult<()> + Send,
    {
        let mut batches = self.batches.write().await;
        let record = batches
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::UnknownBatch(batch_id.to_string()))?;
        ensure_active(&record.header)?;
        append(record)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn batch(&self, batch_id: &str) -> StoreResult<Option<Batch>> {
        let batches = self.batches.read().await;
        Ok(batches.get(batch_id).map(|record| record.header.clone()))
    }

    async fn processing_history(&self, batch_id: &str) -> StoreResult<Vec<ProcessingStep>> {
        let batches = self.batches.read().await;
        Ok(batches
            .get(batch_id)
            .map(|record| record.processing.clone())
            .unwrap_or_default())
    }

    async fn distribution_history(&self, batch_id: &str) -> StoreResult<Vec<DistributionStep>> {
        let batches = self.batches.read().await;
        Ok(batches
            .get(batch_id)
            .map(|record| record.distribution.clone())
            .unwrap_or_default())
    }

    async fn quality_tests(&self, batch_id: &str) -> StoreResult<Vec<QualityTest>> {
        let batches = self.batches.read().await;
        Ok(batches
            .get(batch_id)
            .map(|record| record.quality_tests.clone())
            .unwrap_or_default())
    }

    async fn iot_data(&self, batch_id: &str) -> StoreResult<Vec<IotReading>> {
        let batches = self.batches.read().await;
        Ok(batches
            .get(batch_id)
            .map(|record| record.iot_data.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerWriter for InMemoryLedger {
    async fn create_batch(&self, batch: NewBatch, farmer: Address) -> StoreResult<()> {
        self.import_batch(batch.into_batch(farmer)).await
    }

    async fn add_processing_step(&self, batch_id: &str, step: ProcessingStep) -> StoreResult<()> {
        self.append(batch_id, |record| {
            record.processing.push(step);
            record.header.current_stage =
                stage_after_append(record.header.current_stage, Stage::Processing);
            Ok(())
        })
        .await
    }

    async fn add_distribution_step(
        &self,
        batch_id: &str,
        step: DistributionStep,
    ) -> StoreResult<()> {
        self.append(batch_id, |record| {
            record.distribution.push(step);
            record.header.current_stage =
                stage_after_append(record.header.current_stage, Stage::Distribution);
            Ok(())
        })
        .await
    }

    async fn add_quality_test(&self, batch_id: &str, test: QualityTest) -> StoreResult<()> {
        self.append(batch_id, |record| {
            record.quality_tests.push(test);
            Ok(())
        })
        .await
    }

    async fn add_iot_reading(&self, batch_id: &str, reading: IotReading) -> StoreResult<()> {
        self.append(batch_id, |record| {
            record.iot_data.push(reading);
            Ok(())
        })
        .await
    }

    async fn advance_stage(&self, batch_id: &str, stage: Stage) -> StoreResult<()> {
        self.append(batch_id, |record| {
            record.header.current_stage =
                checked_transition(batch_id, record.header.current_stage, stage)?;
            Ok(())
        })
        .await
    }

    async fn deactivate_batch(&self, batch_id: &str) -> StoreResult<()> {
        let mut batches = self.batches.write().await;
        let record = batches
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::UnknownBatch(batch_id.to_string()))?;
        record.header.is_active = false;
        Ok(())
    }
}
