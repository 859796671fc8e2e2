//! Strict decoding of contract return values.
//!
//! The contract returns each record as an ABI tuple. Every tuple must have
//! exactly the expected arity and every element the expected token kind;
//! anything else is a `StoreError::Decode`. No field is ever defaulted.

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::ledger::error::{StoreError, StoreResult};
use crate::types::{Batch, DistributionStep, IotReading, ProcessingStep, QualityTest};

/// Cursor over the elements of one decoded tuple
struct Fields {
    record: &'static str,
    tokens: std::vec::IntoIter<Token>,
}

impl Fields {
    fn open(token: Token, record: &'static str, arity: usize) -> StoreResult<Self> {
        let tokens = match token {
            Token::Tuple(tokens) => tokens,
            other => {
                return Err(StoreError::Decode(format!(
                    "{record}: expected a tuple, got {other:?}"
                )))
            }
        };
        if tokens.len() != arity {
            return Err(StoreError::Decode(format!(
                "{record}: expected {arity} fields, got {}",
                tokens.len()
            )));
        }
        Ok(Self {
            record,
            tokens: tokens.into_iter(),
        })
    }

    fn next(&mut self, field: &str) -> StoreResult<Token> {
        self.tokens
            .next()
            .ok_or_else(|| StoreError::Decode(format!("{}.{field}: missing", self.record)))
    }

    fn mismatch(&self, field: &str, expected: &str, got: &Token) -> StoreError {
        StoreError::Decode(format!(
            "{}.{field}: expected {expected}, got {got:?}",
            self.record
        ))
    }

    fn string(&mut self, field: &str) -> StoreResult<String> {
        match self.next(field)? {
            Token::String(value) => Ok(value),
            other => Err(self.mismatch(field, "string", &other)),
        }
    }

    fn address(&mut self, field: &str) -> StoreResult<Address> {
        match self.next(field)? {
            Token::Address(value) => Ok(value),
            other => Err(self.mismatch(field, "address", &other)),
        }
    }

    fn uint(&mut self, field: &str) -> StoreResult<U256> {
        match self.next(field)? {
            Token::Uint(value) => Ok(value),
            other => Err(self.mismatch(field, "uint", &other)),
        }
    }

    fn boolean(&mut self, field: &str) -> StoreResult<bool> {
        match self.next(field)? {
            Token::Bool(value) => Ok(value),
            other => Err(self.mismatch(field, "bool", &other)),
        }
    }

    /// `uint8` enum index
    fn stage(&mut self, field: &str) -> StoreResult<u8> {
        let value = self.uint(field)?;
        if value > U256::from(u8::MAX) {
            return Err(StoreError::Decode(format!(
                "{}.{field}: {value} does not fit uint8",
                self.record
            )));
        }
        Ok(value.low_u32() as u8)
    }
}

pub fn decode_batch(token: Token) -> StoreResult<Batch> {
    let mut f = Fields::open(token, "Batch", 13)?;
    Ok(Batch {
        batch_id: f.string("batchId")?,
        herb_name: f.string("herbName")?,
        herb_variety: f.string("herbVariety")?,
        farmer: f.address("farmer")?,
        farm_location: f.string("farmLocation")?,
        gps_coordinates: f.string("gpsCoordinates")?,
        planting_date: f.uint("plantingDate")?,
        harvest_date: f.uint("harvestDate")?,
        quantity: f.uint("quantity")?,
        soil_condition: f.string("soilCondition")?,
        is_organic: f.boolean("isOrganic")?,
        current_stage: f.stage("currentStage")?,
        is_active: f.boolean("isActive")?,
    })
}

pub fn decode_processing_step(token: Token) -> StoreResult<ProcessingStep> {
    let mut f = Fields::open(token, "ProcessingStep", 8)?;
    Ok(ProcessingStep {
        processor: f.address("processor")?,
        process_date: f.uint("processDate")?,
        process_method: f.string("processMethod")?,
        temperature: f.uint("temperature")?,
        duration: f.uint("duration")?,
        quality_grade: f.string("qualityGrade")?,
        certification_hash: f.string("certificationHash")?,
        output_quantity: f.uint("outputQuantity")?,
    })
}

pub fn decode_distribution_step(token: Token) -> StoreResult<DistributionStep> {
    let mut f = Fields::open(token, "DistributionStep", 7)?;
    Ok(DistributionStep {
        distributor: f.address("distributor")?,
        destination: f.address("destination")?,
        ship_date: f.uint("shipDate")?,
        expected_delivery: f.uint("expectedDelivery")?,
        transport_conditions: f.string("transportConditions")?,
        temperature_controlled: f.boolean("temperatureControlled")?,
        tracking_id: f.string("trackingId")?,
    })
}

pub fn decode_quality_test(token: Token) -> StoreResult<QualityTest> {
    let mut f = Fields::open(token, "QualityTest", 6)?;
    Ok(QualityTest {
        tester: f.address("tester")?,
        test_date: f.uint("testDate")?,
        test_type: f.string("testType")?,
        passed: f.boolean("passed")?,
        test_results: f.string("testResults")?,
        certification_id: f.string("certificationId")?,
    })
}

pub fn decode_iot_reading(token: Token) -> StoreResult<IotReading> {
    let mut f = Fields::open(token, "IotReading", 4)?;
    Ok(IotReading {
        sensor_type: f.string("sensorType")?,
        value: f.string("value")?,
        unit: f.string("unit")?,
        timestamp: f.uint("timestamp")?,
    })
}

/// Decode a dynamic array of tuples, preserving order.
pub fn decode_list<T>(
    token: Token,
    record: &'static str,
    decode_one: fn(Token) -> StoreResult<T>,
) -> StoreResult<Vec<T>> {
    match token {
        Token::Array(items) => items.into_iter().map(decode_one).collect(),
        other => Err(StoreError::Decode(format!(
            "{record}[]: expected an array, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_tokens(stage: u64) -> Vec<Token> {
        vec![
            Token::String("ASH-2024-001".into()),
            Token::String("Ashwagandha".into()),
            Token::String("Withania somnifera".into()),
            Token::Address(Address::repeat_byte(0x70)),
            Token::String("Nagpur, Maharashtra".into()),
            Token::String("21.1458° N, 79.0882° E".into()),
            Token::Uint(U256::from(1_686_787_200u64)),
            Token::Uint(U256::from(1_703_030_400u64)),
            Token::Uint(U256::from(5000)),
            Token::String("Rich loamy soil".into()),
            Token::Bool(true),
            Token::Uint(U256::from(stage)),
            Token::Bool(true),
        ]
    }

    #[test]
    fn decodes_batch_header() {
        let batch = decode_batch(Token::Tuple(batch_tokens(2))).unwrap();
        assert_eq!(batch.batch_id, "ASH-2024-001");
        assert_eq!(batch.farmer, Address::repeat_byte(0x70));
        assert_eq!(batch.quantity, U256::from(5000));
        assert_eq!(batch.current_stage, 2);
        assert!(batch.is_active);
    }

    #[test]
    fn rejects_wrong_arity() {
        let mut tokens = batch_tokens(0);
        tokens.pop();
        let err = decode_batch(Token::Tuple(tokens)).unwrap_err();
        assert!(err.to_string().contains("expected 13 fields, got 12"));
    }

    #[test]
    fn rejects_wrong_token_kind() {
        let mut tokens = batch_tokens(0);
        tokens[3] = Token::String("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into());
        let err = decode_batch(Token::Tuple(tokens)).unwrap_err();
        assert!(matches!(err, StoreError::Decode(msg) if msg.contains("Batch.farmer")));
    }

    #[test]
    fn rejects_stage_wider_than_uint8() {
        let err = decode_batch(Token::Tuple(batch_tokens(256))).unwrap_err();
        assert!(err.to_string().contains("currentStage"));
    }

    #[test]
    fn keeps_out_of_range_stage_index() {
        let batch = decode_batch(Token::Tuple(batch_tokens(9))).unwrap();
        assert_eq!(batch.current_stage, 9);
    }

    #[test]
    fn decodes_iot_list_in_order() {
        let reading = |value: &str| {
            Token::Tuple(vec![
                Token::String("Humidity".into()),
                Token::String(value.into()),
                Token::String("%".into()),
                Token::Uint(U256::from(1_704_537_000u64)),
            ])
        };
        let list = Token::Array(vec![reading("45"), reading("47"), reading("44")]);
        let readings = decode_list(list, "IotReading", decode_iot_reading).unwrap();
        let values: Vec<_> = readings.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["45", "47", "44"]);
    }

    #[test]
    fn empty_array_is_an_empty_list() {
        let steps = decode_list(Token::Array(vec![]), "ProcessingStep", decode_processing_step)
            .unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn one_bad_element_fails_the_whole_list() {
        let good = Token::Tuple(vec![
            Token::Address(Address::zero()),
            Token::Uint(U256::from(1)),
            Token::String("Purity".into()),
            Token::Bool(true),
            Token::String("99.5% pure".into()),
            Token::String("QC-1".into()),
        ]);
        let bad = Token::Tuple(vec![Token::Bool(false)]);
        let result = decode_list(
            Token::Array(vec![good, bad]),
            "QualityTest",
            decode_quality_test,
        );
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[test]
    fn list_must_be_an_array() {
        let result = decode_list(Token::Bool(true), "DistributionStep", decode_distribution_step);
        assert!(result.is_err());
    }
}
