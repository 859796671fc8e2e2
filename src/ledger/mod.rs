//! Ledger Module
//!
//! This module is the boundary to the authoritative batch ledger:
//! - `LedgerStore`: read-only access to a batch header and its four event streams
//! - `LedgerWriter`: append-only writes enforcing the lifecycle invariants
//! - Backends: the herb tracker smart contract, SQLite, and in-memory

mod contract;
mod database;
mod decode;
mod error;
mod memory;
pub mod seed;
mod traits;

pub use contract::{builtin_abi, load_abi, ContractLedger};
pub use database::SqliteLedger;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLedger;
pub use traits::{LedgerStore, LedgerWriter};

use crate::config::{Config, LedgerBackend};
use std::sync::Arc;
use tracing::info;

/// Open the ledger selected in the configuration
///
/// Connection problems are fatal here: the service does not start against a
/// ledger it cannot reach.
pub async fn open(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let store: Arc<dyn LedgerStore> = match config.ledger.backend {
        LedgerBackend::Contract => {
            let contract = config
                .contract
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("missing [contract] section"))?;
            if config.ledger.seed_demo {
                tracing::warn!("seed_demo is ignored for the read-only contract backend");
            }
            Arc::new(ContractLedger::connect(contract).await?)
        }
        LedgerBackend::Sqlite => {
            let database = config
                .database
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("missing [database] section"))?;
            let ledger = SqliteLedger::connect(&database.url).await?;
            if config.ledger.seed_demo {
                seed::seed_demo(&ledger).await?;
            }
            Arc::new(ledger)
        }
        LedgerBackend::Memory => {
            let ledger = InMemoryLedger::new();
            if config.ledger.seed_demo {
                seed::seed_demo(&ledger).await?;
            }
            Arc::new(ledger)
        }
    };

    info!("Ledger store opened ({})", store.backend_name());
    Ok(store)
}
