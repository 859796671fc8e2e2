//! SQLite Ledger Module
//!
//! Persistent, append-only ledger for running without a chain. Each stream
//! is its own table; an autoincrement `seq` column preserves append order.
//!
//! # Storage
//! Wide integers (`uint256` on chain) are stored as decimal TEXT and
//! addresses as 0x-prefixed hex, so nothing is narrowed on the way in.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::info;

use crate::ledger::error::{StoreError, StoreResult};
use crate::ledger::traits::{
    checked_transition, ensure_active, stage_after_append, LedgerStore, LedgerWriter,
};
use crate::types::{
    Batch, DistributionStep, IotReading, NewBatch, ProcessingStep, QualityTest, Stage,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS batches (
        batch_id TEXT PRIMARY KEY NOT NULL,
        herb_name TEXT NOT NULL,
        herb_variety TEXT NOT NULL,
        farmer TEXT NOT NULL,
        farm_location TEXT NOT NULL,
        gps_coordinates TEXT NOT NULL,
        planting_date TEXT NOT NULL,
        harvest_date TEXT NOT NULL,
        quantity TEXT NOT NULL,
        soil_condition TEXT NOT NULL,
        is_organic INTEGER NOT NULL,
        current_stage INTEGER NOT NULL,
        is_active INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS processing_steps (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id TEXT NOT NULL REFERENCES batches(batch_id),
        processor TEXT NOT NULL,
        process_date TEXT NOT NULL,
        process_method TEXT NOT NULL,
        temperature TEXT NOT NULL,
        duration TEXT NOT NULL,
        quality_grade TEXT NOT NULL,
        certification_hash TEXT NOT NULL,
        output_quantity TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS distribution_steps (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id TEXT NOT NULL REFERENCES batches(batch_id),
        distributor TEXT NOT NULL,
        destination TEXT NOT NULL,
        ship_date TEXT NOT NULL,
        expected_delivery TEXT NOT NULL,
        transport_conditions TEXT NOT NULL,
        temperature_controlled INTEGER NOT NULL,
        tracking_id TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS quality_tests (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id TEXT NOT NULL REFERENCES batches(batch_id),
        tester TEXT NOT NULL,
        test_date TEXT NOT NULL,
        test_type TEXT NOT NULL,
        passed INTEGER NOT NULL,
        test_results TEXT NOT NULL,
        certification_id TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS iot_readings (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id TEXT NOT NULL REFERENCES batches(batch_id),
        sensor_type TEXT NOT NULL,
        value TEXT NOT NULL,
        unit TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )",
];

/// Ledger stored in a SQLite database
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (creating if missing) the database at `url` and apply the schema
    ///
    /// `sqlite::memory:` gets a single long-lived connection, since every
    /// in-memory connection would otherwise see its own empty database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(classify)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await.map_err(classify)?;

        let ledger = Self { pool };
        ledger.migrate().await?;
        info!("SQLite ledger ready at {}", url);
        Ok(ledger)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    /// Load the header inside a write transaction and check it accepts appends
    async fn lock_active(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
    ) -> StoreResult<Batch> {
        let row = sqlx::query("SELECT * FROM batches WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::UnknownBatch(batch_id.to_string()))?;
        let batch = batch_from_row(&row)?;
        ensure_active(&batch)?;
        Ok(batch)
    }

    async fn set_stage(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: &str,
        stage: u8,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE batches SET current_stage = ? WHERE batch_id = ?")
            .bind(i64::from(stage))
            .bind(batch_id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Connection-level failures mean the store is unavailable; row decoding
/// failures mean a malformed record.
fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Decode(err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

/// A primary key collision on insert means another writer created the batch first.
fn insert_error(batch_id: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(e) if e.is_unique_violation() => {
            StoreError::DuplicateBatch(batch_id.to_string())
        }
        other => classify(other),
    }
}

fn uint_column(row: &SqliteRow, column: &str) -> StoreResult<U256> {
    let text: String = row.try_get(column).map_err(classify)?;
    U256::from_dec_str(&text)
        .map_err(|e| StoreError::Decode(format!("{column}: {text:?} is not a decimal uint: {e}")))
}

fn address_column(row: &SqliteRow, column: &str) -> StoreResult<Address> {
    let text: String = row.try_get(column).map_err(classify)?;
    text.parse()
        .map_err(|e| StoreError::Decode(format!("{column}: {text:?} is not an address: {e}")))
}

fn stage_column(row: &SqliteRow, column: &str) -> StoreResult<u8> {
    let value: i64 = row.try_get(column).map_err(classify)?;
    u8::try_from(value)
        .map_err(|_| StoreError::Decode(format!("{column}: {value} does not fit uint8")))
}

fn address_text(address: &Address) -> String {
    format!("{address:#x}")
}

fn batch_from_row(row: &SqliteRow) -> StoreResult<Batch> {
    Ok(Batch {
        batch_id: row.try_get("batch_id").map_err(classify)?,
        herb_name: row.try_get("herb_name").map_err(classify)?,
        herb_variety: row.try_get("herb_variety").map_err(classify)?,
        farmer: address_column(row, "farmer")?,
        farm_location: row.try_get("farm_location").map_err(classify)?,
        gps_coordinates: row.try_get("gps_coordinates").map_err(classify)?,
        planting_date: uint_column(row, "planting_date")?,
        harvest_date: uint_column(row, "harvest_date")?,
        quantity: uint_column(row, "quantity")?,
        soil_condition: row.try_get("soil_condition").map_err(classify)?,
        is_organic: row.try_get("is_organic").map_err(classify)?,
        current_stage: stage_column(row, "current_stage")?,
        is_active: row.try_get("is_active").map_err(classify)?,
    })
}

fn processing_from_row(row: &SqliteRow) -> StoreResult<ProcessingStep> {
    Ok(ProcessingStep {
        processor: address_column(row, "processor")?,
        process_date: uint_column(row, "process_date")?,
        process_method: row.try_get("process_method").map_err(classify)?,
        temperature: uint_column(row, "temperature")?,
        duration: uint_column(row, "duration")?,
        quality_grade: row.try_get("quality_grade").map_err(classify)?,
        certification_hash: row.try_get("certification_hash").map_err(classify)?,
        output_quantity: uint_column(row, "output_quantity")?,
    })
}

fn distribution_from_row(row: &SqliteRow) -> StoreResult<DistributionStep> {
    Ok(DistributionStep {
        distributor: address_column(row, "distributor")?,
        destination: address_column(row, "destination")?,
        ship_date: uint_column(row, "ship_date")?,
        expected_delivery: uint_column(row, "expected_delivery")?,
        transport_conditions: row.try_get("transport_conditions").map_err(classify)?,
        temperature_controlled: row.try_get("temperature_controlled").map_err(classify)?,
        tracking_id: row.try_get("tracking_id").map_err(classify)?,
    })
}

fn quality_test_from_row(row: &SqliteRow) -> StoreResult<QualityTest> {
    Ok(QualityTest {
        tester: address_column(row, "tester")?,
        test_date: uint_column(row, "test_date")?,
        test_type: row.try_get("test_type").map_err(classify)?,
        passed: row.try_get("passed").map_err(classify)?,
        test_results: row.try_get("test_results").map_err(classify)?,
        certification_id: row.try_get("certification_id").map_err(classify)?,
    })
}

fn iot_reading_from_row(row: &SqliteRow) -> StoreResult<IotReading> {
    Ok(IotReading {
        sensor_type: row.try_get("sensor_type").map_err(classify)?,
        value: row.try_get("value").map_err(classify)?,
        unit: row.try_get("unit").map_err(classify)?,
        timestamp: uint_column(row, "timestamp")?,
    })
}

impl SqliteLedger {
    async fn fetch_list<T>(
        &self,
        sql: &str,
        batch_id: &str,
        decode: fn(&SqliteRow) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        let rows = sqlx::query(sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(decode).collect()
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn batch(&self, batch_id: &str) -> StoreResult<Option<Batch>> {
        let row = sqlx::query("SELECT * FROM batches WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(batch_from_row).transpose()
    }

    async fn processing_history(&self, batch_id: &str) -> StoreResult<Vec<ProcessingStep>> {
        self.fetch_list(
            "SELECT * FROM processing_steps WHERE batch_id = ? ORDER BY seq",
            batch_id,
            processing_from_row,
        )
        .await
    }

    async fn distribution_history(&self, batch_id: &str) -> StoreResult<Vec<DistributionStep>> {
        self.fetch_list(
            "SELECT * FROM distribution_steps WHERE batch_id = ? ORDER BY seq",
            batch_id,
            distribution_from_row,
        )
        .await
    }

    async fn quality_tests(&self, batch_id: &str) -> StoreResult<Vec<QualityTest>> {
        self.fetch_list(
            "SELECT * FROM quality_tests WHERE batch_id = ? ORDER BY seq",
            batch_id,
            quality_test_from_row,
        )
        .await
    }

    async fn iot_data(&self, batch_id: &str) -> StoreResult<Vec<IotReading>> {
        self.fetch_list(
            "SELECT * FROM iot_readings WHERE batch_id = ? ORDER BY seq",
            batch_id,
            iot_reading_from_row,
        )
        .await
    }
}

#[async_trait]
impl LedgerWriter for SqliteLedger {
    async fn create_batch(&self, batch: NewBatch, farmer: Address) -> StoreResult<()> {
        let batch = batch.into_batch(farmer);
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let existing = sqlx::query("SELECT batch_id FROM batches WHERE batch_id = ?")
            .bind(&batch.batch_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify)?;
        if existing.is_some() {
            return Err(StoreError::DuplicateBatch(batch.batch_id));
        }

        sqlx::query(
            "INSERT INTO batches (batch_id, herb_name, herb_variety, farmer, farm_location,
                gps_coordinates, planting_date, harvest_date, quantity, soil_condition,
                is_organic, current_stage, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&batch.batch_id)
        .bind(&batch.herb_name)
        .bind(&batch.herb_variety)
        .bind(address_text(&batch.farmer))
        .bind(&batch.farm_location)
        .bind(&batch.gps_coordinates)
        .bind(batch.planting_date.to_string())
        .bind(batch.harvest_date.to_string())
        .bind(batch.quantity.to_string())
        .bind(&batch.soil_condition)
        .bind(batch.is_organic)
        .bind(i64::from(batch.current_stage))
        .bind(batch.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(&batch.batch_id, e))?;

        tx.commit().await.map_err(classify)
    }

    async fn add_processing_step(&self, batch_id: &str, step: ProcessingStep) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let batch = Self::lock_active(&mut tx, batch_id).await?;

        sqlx::query(
            "INSERT INTO processing_steps (batch_id, processor, process_date, process_method,
                temperature, duration, quality_grade, certification_hash, output_quantity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(address_text(&step.processor))
        .bind(step.process_date.to_string())
        .bind(&step.process_method)
        .bind(step.temperature.to_string())
        .bind(step.duration.to_string())
        .bind(&step.quality_grade)
        .bind(&step.certification_hash)
        .bind(step.output_quantity.to_string())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let stage = stage_after_append(batch.current_stage, Stage::Processing);
        Self::set_stage(&mut tx, batch_id, stage).await?;
        tx.commit().await.map_err(classify)
    }

    async fn add_distribution_step(
        &self,
        batch_id: &str,
        step: DistributionStep,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let batch = Self::lock_active(&mut tx, batch_id).await?;

        sqlx::query(
            "INSERT INTO distribution_steps (batch_id, distributor, destination, ship_date,
                expected_delivery, transport_conditions, temperature_controlled, tracking_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(address_text(&step.distributor))
        .bind(address_text(&step.destination))
        .bind(step.ship_date.to_string())
        .bind(step.expected_delivery.to_string())
        .bind(&step.transport_conditions)
        .bind(step.temperature_controlled)
        .bind(&step.tracking_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let stage = stage_after_append(batch.current_stage, Stage::Distribution);
        Self::set_stage(&mut tx, batch_id, stage).await?;
        tx.commit().await.map_err(classify)
    }

    async fn add_quality_test(&self, batch_id: &str, test: QualityTest) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        Self::lock_active(&mut tx, batch_id).await?;

        sqlx::query(
            "INSERT INTO quality_tests (batch_id, tester, test_date, test_type, passed,
                test_results, certification_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(address_text(&test.tester))
        .bind(test.test_date.to_string())
        .bind(&test.test_type)
        .bind(test.passed)
        .bind(&test.test_results)
        .bind(&test.certification_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)
    }

    async fn add_iot_reading(&self, batch_id: &str, reading: IotReading) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        Self::lock_active(&mut tx, batch_id).await?;

        sqlx::query(
            "INSERT INTO iot_readings (batch_id, sensor_type, value, unit, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(&reading.sensor_type)
        .bind(&reading.value)
        .bind(&reading.unit)
        .bind(reading.timestamp.to_string())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)
    }

    async fn advance_stage(&self, batch_id: &str, stage: Stage) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let batch = Self::lock_active(&mut tx, batch_id).await?;
        let next = checked_transition(batch_id, batch.current_stage, stage)?;
        Self::set_stage(&mut tx, batch_id, next).await?;
        tx.commit().await.map_err(classify)
    }

    async fn deactivate_batch(&self, batch_id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE batches SET is_active = 0 WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownBatch(batch_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> SqliteLedger {
        SqliteLedger::connect("sqlite::memory:").await.unwrap()
    }

    fn new_batch(id: &str, quantity: U256) -> NewBatch {
        NewBatch {
            batch_id: id.to_string(),
            herb_name: "Brahmi".into(),
            herb_variety: "Bacopa monnieri".into(),
            farm_location: "Kerala, India".into(),
            gps_coordinates: "10.8505° N, 76.2711° E".into(),
            planting_date: U256::from(1_686_787_200u64),
            harvest_date: U256::from(1_703_030_400u64),
            quantity,
            soil_condition: "Wetland".into(),
            is_organic: false,
        }
    }

    fn shipment(tracking_id: &str) -> DistributionStep {
        DistributionStep {
            distributor: Address::repeat_byte(0x90),
            destination: Address::from_low_u64_be(1),
            ship_date: U256::from(1_704_412_800u64),
            expected_delivery: U256::from(1_705_276_800u64),
            transport_conditions: "20-25°C, 60% humidity".into(),
            temperature_controlled: true,
            tracking_id: tracking_id.into(),
        }
    }

    #[tokio::test]
    async fn round_trips_header_without_narrowing() {
        let ledger = ledger().await;
        let quantity = U256::from_dec_str("9007199254740993").unwrap();
        let farmer = Address::repeat_byte(0x70);
        ledger.create_batch(new_batch("BR-1", quantity), farmer).await.unwrap();

        let batch = ledger.batch("BR-1").await.unwrap().unwrap();
        assert_eq!(batch.quantity, quantity);
        assert_eq!(batch.farmer, farmer);
        assert_eq!(batch.current_stage, 0);
        assert!(batch.is_active);
        assert!(!batch.is_organic);
    }

    #[tokio::test]
    async fn rejects_duplicate_identifier() {
        let ledger = ledger().await;
        ledger.create_batch(new_batch("BR-2", U256::one()), Address::zero()).await.unwrap();
        let err = ledger
            .create_batch(new_batch("BR-2", U256::one()), Address::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBatch(_)));
    }

    #[tokio::test]
    async fn key_collision_on_insert_is_a_duplicate() {
        let ledger = ledger().await;
        ledger.create_batch(new_batch("BR-9", U256::one()), Address::zero()).await.unwrap();

        let err = sqlx::query("INSERT INTO batches SELECT * FROM batches WHERE batch_id = ?")
            .bind("BR-9")
            .execute(&ledger.pool)
            .await
            .unwrap_err();
        assert!(matches!(insert_error("BR-9", err), StoreError::DuplicateBatch(id) if id == "BR-9"));
    }

    #[tokio::test]
    async fn distribution_appends_in_order_and_advance_stage() {
        let ledger = ledger().await;
        ledger.create_batch(new_batch("BR-3", U256::one()), Address::zero()).await.unwrap();
        ledger.add_distribution_step("BR-3", shipment("TRK-1")).await.unwrap();
        ledger.add_distribution_step("BR-3", shipment("TRK-2")).await.unwrap();

        let ids: Vec<_> = ledger
            .distribution_history("BR-3")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.tracking_id)
            .collect();
        assert_eq!(ids, vec!["TRK-1", "TRK-2"]);

        let batch = ledger.batch("BR-3").await.unwrap().unwrap();
        assert_eq!(batch.current_stage, Stage::Distribution.index());
    }

    #[tokio::test]
    async fn stage_never_regresses() {
        let ledger = ledger().await;
        ledger.create_batch(new_batch("BR-4", U256::one()), Address::zero()).await.unwrap();
        ledger.advance_stage("BR-4", Stage::Consumer).await.unwrap();
        ledger.add_distribution_step("BR-4", shipment("TRK-3")).await.unwrap();

        let batch = ledger.batch("BR-4").await.unwrap().unwrap();
        assert_eq!(batch.current_stage, Stage::Consumer.index());

        let err = ledger.advance_stage("BR-4", Stage::Retail).await.unwrap_err();
        assert!(matches!(err, StoreError::StageRegression { .. }));
    }

    #[tokio::test]
    async fn appends_to_unknown_or_inactive_batches_fail() {
        let ledger = ledger().await;
        let err = ledger.add_distribution_step("nope", shipment("T")).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownBatch(_)));

        ledger.create_batch(new_batch("BR-5", U256::one()), Address::zero()).await.unwrap();
        ledger.deactivate_batch("BR-5").await.unwrap();
        let err = ledger.add_distribution_step("BR-5", shipment("T")).await.unwrap_err();
        assert!(matches!(err, StoreError::InactiveBatch(_)));

        let err = ledger.deactivate_batch("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownBatch(_)));
    }

    #[tokio::test]
    async fn corrupt_amount_is_a_decode_error() {
        let ledger = ledger().await;
        ledger.create_batch(new_batch("BR-6", U256::one()), Address::zero()).await.unwrap();
        sqlx::query("UPDATE batches SET quantity = '12kg' WHERE batch_id = 'BR-6'")
            .execute(&ledger.pool)
            .await
            .unwrap();

        let err = ledger.batch("BR-6").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(msg) if msg.contains("quantity")));
    }
}
