use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a batch
///
/// The discriminants match the contract's `Stage` enum (uint8 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Farm = 0,
    Processing = 1,
    Distribution = 2,
    Retail = 3,
    Consumer = 4,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Farm,
        Stage::Processing,
        Stage::Distribution,
        Stage::Retail,
        Stage::Consumer,
    ];

    pub fn from_index(index: u8) -> Option<Stage> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Farm => "Farm",
            Stage::Processing => "Processing",
            Stage::Distribution => "Distribution",
            Stage::Retail => "Retail",
            Stage::Consumer => "Consumer",
        }
    }
}

/// Batch header as recorded on the ledger
///
/// `current_stage` is kept as the raw index read from the store so that an
/// out-of-range value survives decoding and is handled by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub batch_id: String,
    pub herb_name: String,
    pub herb_variety: String,
    pub farmer: Address,
    pub farm_location: String,
    pub gps_coordinates: String,
    pub planting_date: U256,
    pub harvest_date: U256,
    /// Grams
    pub quantity: U256,
    pub soil_condition: String,
    pub is_organic: bool,
    pub current_stage: u8,
    pub is_active: bool,
}

/// Farmer-supplied fields for a new batch
///
/// The ledger fills in the farmer, stage and active flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    pub batch_id: String,
    pub herb_name: String,
    pub herb_variety: String,
    pub farm_location: String,
    pub gps_coordinates: String,
    pub planting_date: U256,
    pub harvest_date: U256,
    pub quantity: U256,
    pub soil_condition: String,
    pub is_organic: bool,
}

impl NewBatch {
    pub fn into_batch(self, farmer: Address) -> Batch {
        Batch {
            batch_id: self.batch_id,
            herb_name: self.herb_name,
            herb_variety: self.herb_variety,
            farmer,
            farm_location: self.farm_location,
            gps_coordinates: self.gps_coordinates,
            planting_date: self.planting_date,
            harvest_date: self.harvest_date,
            quantity: self.quantity,
            soil_condition: self.soil_condition,
            is_organic: self.is_organic,
            current_stage: Stage::Farm.index(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStep {
    pub processor: Address,
    pub process_date: U256,
    pub process_method: String,
    /// Degrees Celsius
    pub temperature: U256,
    /// Hours
    pub duration: U256,
    pub quality_grade: String,
    /// Content hash of the off-chain certification artifact
    pub certification_hash: String,
    pub output_quantity: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionStep {
    pub distributor: Address,
    pub destination: Address,
    pub ship_date: U256,
    pub expected_delivery: U256,
    pub transport_conditions: String,
    pub temperature_controlled: bool,
    pub tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityTest {
    pub tester: Address,
    pub test_date: U256,
    pub test_type: String,
    pub passed: bool,
    /// Free text or a content hash of the full report
    pub test_results: String,
    pub certification_id: String,
}

/// Sensor reading attached to a batch
///
/// `value` stays a string because units vary per sensor (e.g. "22.5" for
/// temperature, "26.9124,75.7873" for GPS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IotReading {
    pub sensor_type: String,
    pub value: String,
    pub unit: String,
    pub timestamp: U256,
}
