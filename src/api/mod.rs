//! API Module
//!
//! This module handles the REST API clients use to look up a batch.

mod error;
mod server;

pub use error::ApiError;
pub use server::{router, AppState, Server};
