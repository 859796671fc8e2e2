//! Batch Reader Module
//!
//! Turns the five ledger streams of one batch into a single normalized,
//! client-ready document.

mod batch_reader;
mod document;
mod error;


pub use batch_reader::{validate_batch_id, BatchReader};
pub use document::{
    checksum, decimal, iso_timestamp, BatchDocument, BatchView, DistributionView,
    IotReadingView, ProcessingView, QualityTestView, StageInfo,
};
pub use error::ReaderError;
