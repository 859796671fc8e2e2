//! This crate implements the batch lookup service for an herbal supply-chain ledger.
//! It includes modules for the ledger records, the ledger store backends, the batch
//! reader that normalizes them into a client-ready document, the REST API, and configuration.

pub mod types; // Batch header, lifecycle stages, and the four event record types.
pub mod ledger; // Ledger store trait and its contract, SQLite, and in-memory backends.
pub mod reader; // Normalizes one batch and its event streams into a single document.
pub mod api; // REST endpoint exposing the batch reader.
pub mod config; // Defines and loads service configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use reader::{BatchDocument, BatchReader};
