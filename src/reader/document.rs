//! Normalized batch document
//!
//! The client-ready shape returned by `GET /api/batch/{batchId}`:
//! timestamps as ISO-8601 UTC strings with millisecond precision, wide
//! integers as decimal strings, actor addresses in EIP-55 checksum form.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::Serialize;
use tracing::warn;

use crate::reader::error::ReaderError;
use crate::types::{
    Batch, DistributionStep, IotReading, ProcessingStep, QualityTest, Stage,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDocument {
    pub batch: BatchView,
    pub processing: Vec<ProcessingView>,
    pub distribution: Vec<DistributionView>,
    pub quality_tests: Vec<QualityTestView>,
    pub iot_data: Vec<IotReadingView>,
    pub stage_info: StageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub batch_id: String,
    pub herb_name: String,
    pub herb_variety: String,
    pub farmer: String,
    pub farm_location: String,
    pub gps_coordinates: String,
    pub planting_date: String,
    pub harvest_date: String,
    pub quantity: String,
    pub soil_condition: String,
    pub is_organic: bool,
    pub current_stage: u8,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingView {
    pub processor: String,
    pub process_date: String,
    pub process_method: String,
    pub temperature: String,
    pub duration: String,
    pub quality_grade: String,
    pub certification_hash: String,
    pub output_quantity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionView {
    pub distributor: String,
    pub destination: String,
    pub ship_date: String,
    pub expected_delivery: String,
    pub transport_conditions: String,
    pub temperature_controlled: bool,
    pub tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityTestView {
    pub tester: String,
    pub test_date: String,
    pub test_type: String,
    pub passed: bool,
    pub test_results: String,
    pub certification_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IotReadingView {
    pub sensor_type: String,
    pub value: String,
    pub unit: String,
    pub timestamp: String,
}

/// Display descriptor for the batch's current stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub index: u8,
    pub name: &'static str,
}

impl StageInfo {
    /// Look up a stage index; indices outside 0..=4 fall back to Farm.
    pub fn for_index(index: u8) -> Self {
        let stage = Stage::from_index(index).unwrap_or_else(|| {
            warn!("Stage index {} out of range, reporting Farm", index);
            Stage::Farm
        });
        Self {
            index: stage.index(),
            name: stage.name(),
        }
    }
}

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SS.sssZ` (the instant `seconds * 1000` ms).
///
/// Only four-digit years render in that form; later instants are rejected.
pub fn iso_timestamp(seconds: U256) -> Result<String, ReaderError> {
    let out_of_range = || ReaderError::Decode(format!("timestamp {seconds} is out of range"));
    if seconds > U256::from(i64::MAX as u64) {
        return Err(out_of_range());
    }
    let instant =
        DateTime::<Utc>::from_timestamp(seconds.as_u64() as i64, 0).ok_or_else(out_of_range)?;
    if instant.year() > 9999 {
        return Err(out_of_range());
    }
    Ok(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Decimal rendering of a wide integer, exact for any `uint256`.
pub fn decimal(value: U256) -> String {
    value.to_string()
}

pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

impl BatchView {
    fn normalize(batch: Batch) -> Result<Self, ReaderError> {
        Ok(Self {
            planting_date: iso_timestamp(batch.planting_date)?,
            harvest_date: iso_timestamp(batch.harvest_date)?,
            quantity: decimal(batch.quantity),
            farmer: checksum(&batch.farmer),
            batch_id: batch.batch_id,
            herb_name: batch.herb_name,
            herb_variety: batch.herb_variety,
            farm_location: batch.farm_location,
            gps_coordinates: batch.gps_coordinates,
            soil_condition: batch.soil_condition,
            is_organic: batch.is_organic,
            current_stage: batch.current_stage,
            is_active: batch.is_active,
        })
    }
}

impl TryFrom<ProcessingStep> for ProcessingView {
    type Error = ReaderError;

    fn try_from(step: ProcessingStep) -> Result<Self, Self::Error> {
        Ok(Self {
            processor: checksum(&step.processor),
            process_date: iso_timestamp(step.process_date)?,
            process_method: step.process_method,
            temperature: decimal(step.temperature),
            duration: decimal(step.duration),
            quality_grade: step.quality_grade,
            certification_hash: step.certification_hash,
            output_quantity: decimal(step.output_quantity),
        })
    }
}

impl TryFrom<DistributionStep> for DistributionView {
    type Error = ReaderError;

    fn try_from(step: DistributionStep) -> Result<Self, Self::Error> {
        Ok(Self {
            distributor: checksum(&step.distributor),
            destination: checksum(&step.destination),
            ship_date: iso_timestamp(step.ship_date)?,
            expected_delivery: iso_timestamp(step.expected_delivery)?,
            transport_conditions: step.transport_conditions,
            temperature_controlled: step.temperature_controlled,
            tracking_id: step.tracking_id,
        })
    }
}

impl TryFrom<QualityTest> for QualityTestView {
    type Error = ReaderError;

    fn try_from(test: QualityTest) -> Result<Self, Self::Error> {
        Ok(Self {
            tester: checksum(&test.tester),
            test_date: iso_timestamp(test.test_date)?,
            test_type: test.test_type,
            passed: test.passed,
            test_results: test.test_results,
            certification_id: test.certification_id,
        })
    }
}

impl TryFrom<IotReading> for IotReadingView {
    type Error = ReaderError;

    fn try_from(reading: IotReading) -> Result<Self, Self::Error> {
        Ok(Self {
            sensor_type: reading.sensor_type,
            value: reading.value,
            unit: reading.unit,
            timestamp: iso_timestamp(reading.timestamp)?,
        })
    }
}

fn normalize_all<T, V>(records: Vec<T>) -> Result<Vec<V>, ReaderError>
where
    V: TryFrom<T, Error = ReaderError>,
{
    records.into_iter().map(V::try_from).collect()
}

impl BatchDocument {
    /// Normalize a header and its streams into one document.
    ///
    /// Any record that fails normalization fails the whole document.
    pub fn assemble(
        batch: Batch,
        processing: Vec<ProcessingStep>,
        distribution: Vec<DistributionStep>,
        quality_tests: Vec<QualityTest>,
        iot_data: Vec<IotReading>,
    ) -> Result<Self, ReaderError> {
        let stage_info = StageInfo::for_index(batch.current_stage);
        Ok(Self {
            batch: BatchView::normalize(batch)?,
            processing: normalize_all(processing)?,
            distribution: normalize_all(distribution)?,
            quality_tests: normalize_all(quality_tests)?,
            iot_data: normalize_all(iot_data)?,
            stage_info,
        })
    }
}
