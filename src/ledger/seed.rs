//! Demo data
//!
//! Writes the Ashwagandha demo batch `ASH-2024-001` through the normal append
//! path, so every ledger invariant applies to it. Actors are the default
//! Hardhat development accounts.

use ethers::types::{Address, U256};
use tracing::info;

use crate::ledger::error::{StoreError, StoreResult};
use crate::ledger::traits::LedgerWriter;
use crate::types::{DistributionStep, IotReading, NewBatch, ProcessingStep, QualityTest};

pub const DEMO_BATCH_ID: &str = "ASH-2024-001";

const FARMER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const PROCESSOR: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
const DISTRIBUTOR: &str = "0x90F79bf6EB2c4f870365E785982E1f101E93b906";
const TESTER: &str = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65";
const RETAILER: &str = "0x0000000000000000000000000000000000000001";

fn actor(hex: &str) -> StoreResult<Address> {
    hex.parse()
        .map_err(|e| StoreError::Decode(format!("demo actor {hex}: {e}")))
}

fn at(epoch_seconds: u64) -> U256 {
    U256::from(epoch_seconds)
}

/// Seed the demo batch. Returns `false` if it was already present.
pub async fn seed_demo<W>(ledger: &W) -> StoreResult<bool>
where
    W: LedgerWriter + ?Sized,
{
    let batch = NewBatch {
        batch_id: DEMO_BATCH_ID.to_string(),
        herb_name: "Ashwagandha".into(),
        herb_variety: "Withania somnifera".into(),
        farm_location: "Nagpur, Maharashtra".into(),
        gps_coordinates: "21.1458° N, 79.0882° E".into(),
        planting_date: at(1_686_787_200),
        harvest_date: at(1_703_030_400),
        quantity: U256::from(5000),
        soil_condition: "Rich loamy soil".into(),
        is_organic: true,
    };

    match ledger.create_batch(batch, actor(FARMER)?).await {
        Ok(()) => {}
        Err(StoreError::DuplicateBatch(_)) => {
            info!("Demo batch {} already present, skipping seed", DEMO_BATCH_ID);
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    ledger
        .add_processing_step(
            DEMO_BATCH_ID,
            ProcessingStep {
                processor: actor(PROCESSOR)?,
                process_date: at(1_703_203_200),
                process_method: "Sun Drying".into(),
                temperature: U256::from(32),
                duration: U256::from(72),
                quality_grade: "A+".into(),
                certification_hash: "QmXoypizjW3WknFiJnKLwHCnL72vedxjQkDDP1mXWo6uco".into(),
                output_quantity: U256::from(2500),
            },
        )
        .await?;

    let tests = [
        (1_703_462_400, "Purity Test", true, "99.5% pure", "QC-ASH-2024-001"),
        (1_703_548_800, "Heavy Metal Screening", true, "All clear", "QC-ASH-2024-002"),
        (1_703_635_200, "Microbial Analysis", false, "E. coli detected", "QC-ASH-2024-003"),
    ];
    for (date, test_type, passed, results, certification_id) in tests {
        ledger
            .add_quality_test(
                DEMO_BATCH_ID,
                QualityTest {
                    tester: actor(TESTER)?,
                    test_date: at(date),
                    test_type: test_type.into(),
                    passed,
                    test_results: results.into(),
                    certification_id: certification_id.into(),
                },
            )
            .await?;
    }

    ledger
        .add_distribution_step(
            DEMO_BATCH_ID,
            DistributionStep {
                distributor: actor(DISTRIBUTOR)?,
                destination: actor(RETAILER)?,
                ship_date: at(1_704_412_800),
                expected_delivery: at(1_705_276_800),
                transport_conditions: "20-25°C, 60% humidity".into(),
                temperature_controlled: true,
                tracking_id: "TRK-ASH-2024-001".into(),
            },
        )
        .await?;

    let readings = [
        ("Temperature", "22.5", "°C"),
        ("Humidity", "45", "%"),
        ("GPS", "21.1458,79.0882", "coordinates"),
    ];
    for (sensor_type, value, unit) in readings {
        ledger
            .add_iot_reading(
                DEMO_BATCH_ID,
                IotReading {
                    sensor_type: sensor_type.into(),
                    value: value.into(),
                    unit: unit.into(),
                    timestamp: at(1_704_537_000),
                },
            )
            .await?;
    }

    info!("Seeded demo batch {}", DEMO_BATCH_ID);
    Ok(true)
}
