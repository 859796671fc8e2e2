//! Smart Contract Ledger Module
//!
//! Read-only client for the herb tracker contract. Each stream is one view
//! call over JSON-RPC; return values are decoded strictly by
//! [`crate::ledger::decode`].
//!
//! # Contract functions used
//! - `getBatch(string)`
//! - `getProcessingHistory(string)`
//! - `getDistributionHistory(string)`
//! - `getQualityTests(string)`
//! - `getIotData(string)`

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::contract::{Contract, ContractError};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ContractConfig;
use crate::ledger::decode::{
    decode_batch, decode_distribution_step, decode_iot_reading, decode_list,
    decode_processing_step, decode_quality_test,
};
use crate::ledger::error::{StoreError, StoreResult};
use crate::ledger::traits::LedgerStore;
use crate::types::{Batch, DistributionStep, IotReading, ProcessingStep, QualityTest};

/// View functions of the deployed contract, in JSON ABI form
const HERB_TRACKER_ABI: &str = include_str!("herb_tracker.abi.json");

type HttpContract = Contract<Provider<Http>>;

/// Ledger store backed by the herb tracker contract
pub struct ContractLedger {
    contract: HttpContract,
}

impl ContractLedger {
    /// Connect to the RPC endpoint and verify the contract is deployed
    ///
    /// The connection is validated once here: the node must answer and the
    /// configured address must hold code. After that every request reuses the
    /// same provider.
    pub async fn connect(config: &ContractConfig) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())?;
        let address: Address = config.address.parse()?;
        let abi = match &config.abi_path {
            Some(path) => load_abi(path)?,
            None => builtin_abi()?,
        };

        info!("Connecting to Ethereum node at {}", config.rpc_url);
        let block_number = provider.get_block_number().await?;
        let code = provider.get_code(address, None).await?;
        if code.is_empty() {
            anyhow::bail!("no contract code at address {:?}", address);
        }
        info!(
            "Connected to Ethereum node at block {}, contract at {:?}",
            block_number, address
        );

        Ok(Self::from_parts(address, abi, provider))
    }

    /// Build the client without the liveness check
    pub fn from_parts(address: Address, abi: Abi, provider: Provider<Http>) -> Self {
        Self {
            contract: Contract::new(address, abi, Arc::new(provider)),
        }
    }

    async fn call(&self, function: &str, batch_id: &str) -> StoreResult<Token> {
        debug!("Calling {}({})", function, batch_id);
        let call = self
            .contract
            .method::<_, Token>(function, batch_id.to_string())
            .map_err(|e| StoreError::Decode(format!("{function}: {e}")))?;
        call.call()
            .await
            .map_err(|e| classify_call_error(function, batch_id, e))
    }
}

/// Map a failed view call onto the store error taxonomy
///
/// Transport failures mean the ledger is unreachable. A revert is how the
/// contract answers a lookup for an unknown batch. Everything else is a
/// return value that does not match the ABI.
fn classify_call_error(
    function: &str,
    batch_id: &str,
    err: ContractError<Provider<Http>>,
) -> StoreError {
    if err.is_revert() {
        return StoreError::NotFound(batch_id.to_string());
    }
    match err {
        ContractError::MiddlewareError { .. }
        | ContractError::ProviderError { .. }
        | ContractError::ContractNotDeployed => {
            StoreError::Unavailable(format!("{function}: {err}"))
        }
        other => StoreError::Decode(format!("{function}: {other}")),
    }
}

/// A reverted header lookup is an absent batch.
fn header_from_call(result: StoreResult<Token>) -> StoreResult<Option<Batch>> {
    match result {
        Ok(token) => decode_batch(token).map(Some),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn builtin_abi() -> anyhow::Result<Abi> {
    abi_from_json(HERB_TRACKER_ABI)
}

/// Load an ABI from a compiled artifact (`{"abi": [...]}`) or a bare ABI array
pub fn load_abi(path: &Path) -> anyhow::Result<Abi> {
    let content = std::fs::read_to_string(path)?;
    abi_from_json(&content)
}

fn abi_from_json(content: &str) -> anyhow::Result<Abi> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(abi) = value.get_mut("abi") {
        value = abi.take();
    }
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl LedgerStore for ContractLedger {
    fn backend_name(&self) -> &'static str {
        "contract"
    }

    async fn batch(&self, batch_id: &str) -> StoreResult<Option<Batch>> {
        header_from_call(self.call("getBatch", batch_id).await)
    }

    async fn processing_history(&self, batch_id: &str) -> StoreResult<Vec<ProcessingStep>> {
        let token = self.call("getProcessingHistory", batch_id).await?;
        decode_list(token, "ProcessingStep", decode_processing_step)
    }

    async fn distribution_history(&self, batch_id: &str) -> StoreResult<Vec<DistributionStep>> {
        let token = self.call("getDistributionHistory", batch_id).await?;
        decode_list(token, "DistributionStep", decode_distribution_step)
    }

    async fn quality_tests(&self, batch_id: &str) -> StoreResult<Vec<QualityTest>> {
        let token = self.call("getQualityTests", batch_id).await?;
        decode_list(token, "QualityTest", decode_quality_test)
    }

    async fn iot_data(&self, batch_id: &str) -> StoreResult<Vec<IotReading>> {
        let token = self.call("getIotData", batch_id).await?;
        decode_list(token, "IotReading", decode_iot_reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{Detokenize, InvalidOutputType, ParamType};
    use ethers::types::{Bytes, U256};

    /// Encode `output` the way the contract returns it, then decode it
    /// through the built-in ABI as a view call does.
    fn returned_by(function: &str, output: Token) -> Token {
        let abi = builtin_abi().unwrap();
        let data = ethers::abi::encode(&[output]);
        let tokens = abi.function(function).unwrap().decode_output(&data).unwrap();
        Token::from_tokens(tokens).unwrap()
    }

    fn call_error(err: ContractError<Provider<Http>>) -> StoreError {
        classify_call_error("getBatch", "ASH-2024-001", err)
    }

    #[test]
    fn builtin_abi_declares_all_view_functions() {
        let abi = builtin_abi().unwrap();
        for name in [
            "getBatch",
            "getProcessingHistory",
            "getDistributionHistory",
            "getQualityTests",
            "getIotData",
        ] {
            let function = abi.function(name).unwrap();
            assert_eq!(function.inputs.len(), 1);
            assert_eq!(function.inputs[0].kind, ParamType::String);
            assert_eq!(function.outputs.len(), 1);
        }
    }

    #[test]
    fn batch_getter_returns_thirteen_field_tuple() {
        let abi = builtin_abi().unwrap();
        match &abi.function("getBatch").unwrap().outputs[0].kind {
            ParamType::Tuple(fields) => assert_eq!(fields.len(), 13),
            other => panic!("unexpected output type {other:?}"),
        }
    }

    #[test]
    fn history_getters_return_tuple_arrays() {
        let abi = builtin_abi().unwrap();
        match &abi.function("getIotData").unwrap().outputs[0].kind {
            ParamType::Array(inner) => {
                assert!(matches!(inner.as_ref(), ParamType::Tuple(fields) if fields.len() == 4))
            }
            other => panic!("unexpected output type {other:?}"),
        }
    }

    #[test]
    fn decodes_encoded_batch_header() {
        let farmer = Address::repeat_byte(0x70);
        let header = Token::Tuple(vec![
            Token::String("ASH-2024-001".into()),
            Token::String("Ashwagandha".into()),
            Token::String("Withania somnifera".into()),
            Token::Address(farmer),
            Token::String("Nagpur, Maharashtra".into()),
            Token::String("21.1458° N, 79.0882° E".into()),
            Token::Uint(U256::from(1_686_787_200u64)),
            Token::Uint(U256::from(1_703_030_400u64)),
            Token::Uint(U256::from_dec_str("9007199254740993").unwrap()),
            Token::String("Rich loamy soil".into()),
            Token::Bool(true),
            Token::Uint(U256::from(2)),
            Token::Bool(true),
        ]);

        let batch = decode_batch(returned_by("getBatch", header)).unwrap();
        assert_eq!(batch.batch_id, "ASH-2024-001");
        assert_eq!(batch.farmer, farmer);
        assert_eq!(batch.harvest_date, U256::from(1_703_030_400u64));
        assert_eq!(batch.quantity.to_string(), "9007199254740993");
        assert_eq!(batch.soil_condition, "Rich loamy soil");
        assert_eq!(batch.current_stage, 2);
        assert!(batch.is_organic && batch.is_active);
    }

    #[test]
    fn decodes_encoded_iot_history() {
        let reading = |value: &str| {
            Token::Tuple(vec![
                Token::String("Humidity".into()),
                Token::String(value.into()),
                Token::String("%".into()),
                Token::Uint(U256::from(1_704_537_000u64)),
            ])
        };
        let output = Token::Array(vec![reading("45"), reading("47")]);

        let readings =
            decode_list(returned_by("getIotData", output), "IotReading", decode_iot_reading)
                .unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].sensor_type, "Humidity");
        assert_eq!(readings[0].value, "45");
        assert_eq!(readings[1].value, "47");
        assert_eq!(readings[1].timestamp, U256::from(1_704_537_000u64));
    }

    #[test]
    fn decodes_encoded_empty_history() {
        let steps = decode_list(
            returned_by("getProcessingHistory", Token::Array(vec![])),
            "ProcessingStep",
            decode_processing_step,
        )
        .unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn revert_means_unknown_batch() {
        let err = call_error(ContractError::Revert(Bytes::from(vec![0x08, 0xc3, 0x79, 0xa0])));
        assert!(matches!(err, StoreError::NotFound(id) if id == "ASH-2024-001"));
    }

    #[test]
    fn malformed_return_value_is_a_decode_error() {
        let err = call_error(ContractError::DetokenizationError(InvalidOutputType(
            "expected tuple".into(),
        )));
        assert!(matches!(err, StoreError::Decode(msg) if msg.starts_with("getBatch")));
    }

    #[test]
    fn reverted_header_lookup_is_absent() {
        let result = header_from_call(Err(StoreError::NotFound("ASH-2024-001".into())));
        assert_eq!(result.unwrap(), None);

        let result = header_from_call(Err(StoreError::Unavailable("connection refused".into())));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn reads_abi_from_hardhat_artifact() {
        let artifact = r#"{
            "contractName": "AyurvedicHerbTracker",
            "abi": [{
                "type": "function",
                "name": "getIotData",
                "stateMutability": "view",
                "inputs": [{"name": "batchId", "type": "string"}],
                "outputs": [{"name": "", "type": "tuple[]", "components": [
                    {"name": "sensorType", "type": "string"},
                    {"name": "value", "type": "string"},
                    {"name": "unit", "type": "string"},
                    {"name": "timestamp", "type": "uint256"}
                ]}]
            }]
        }"#;
        let abi = abi_from_json(artifact).unwrap();
        assert!(abi.function("getIotData").is_ok());
    }

    #[test]
    fn rejects_artifact_without_abi() {
        assert!(abi_from_json(r#"{"bytecode": "0x00"}"#).is_err());
    }

    #[tokio::test]
    async fn unreachable_node_is_unavailable() {
        // Nothing listens on port 9 (discard); the HTTP transport fails.
        let provider = Provider::<Http>::try_from("http://127.0.0.1:9").unwrap();
        let ledger = ContractLedger::from_parts(Address::zero(), builtin_abi().unwrap(), provider);
        let err = ledger.batch("ASH-2024-001").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    }
}
