//! Configuration Module
//!
//! This module defines all configuration structures for the batch service.
//! Configuration is loaded from TOML files and parsed using serde.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
///
/// Contains all configuration sections for the service.
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [api]
/// host = "127.0.0.1"
/// port = 3001
///
/// [ledger]
/// backend = "contract"
///
/// [contract]
/// rpc_url = "http://127.0.0.1:8545"
/// address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub ledger: LedgerConfig,
    pub contract: Option<ContractConfig>,
    pub database: Option<DatabaseConfig>,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 3001)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Which ledger store backs the batch reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Herb tracker smart contract over JSON-RPC (needs `[contract]`)
    Contract,
    /// Local SQLite ledger (needs `[database]`)
    Sqlite,
    /// In-process ledger, lost on restart
    Memory,
}

/// Ledger selection
///
/// # Fields
/// - `backend`: one of "contract", "sqlite", "memory"
/// - `seed_demo`: write the demo batch at startup (sqlite and memory only)
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    #[serde(default)]
    pub seed_demo: bool,
}

/// Smart contract connection configuration
///
/// # Fields
/// - `rpc_url`: Ethereum JSON-RPC endpoint (e.g., "http://127.0.0.1:8545")
/// - `address`: Address of the deployed herb tracker contract
/// - `abi_path`: Optional compiled artifact (JSON with an `abi` field, or a bare
///   ABI array) overriding the built-in ABI
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub rpc_url: String,
    pub address: String,
    pub abi_path: Option<PathBuf>,
}

/// Database configuration
///
/// # Fields
/// - `url`: Database connection URL (e.g., "sqlite://ledger.db")
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read, the TOML is invalid, or the
    ///   section required by the selected backend is missing
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        match self.ledger.backend {
            LedgerBackend::Contract if self.contract.is_none() => {
                anyhow::bail!("ledger backend \"contract\" requires a [contract] section")
            }
            LedgerBackend::Sqlite if self.database.is_none() => {
                anyhow::bail!("ledger backend \"sqlite\" requires a [database] section")
            }
            _ => Ok(()),
        }
    }
}
