//! API Server Module
//!
//! This module implements the REST server that exposes batch lookups.
//! It provides one read endpoint that clients call after scanning a batch ID,
//! plus a health probe.

use crate::{
    api::error::ApiError,
    config::ApiConfig,
    ledger::LedgerStore,
    reader::{BatchDocument, BatchReader},
};
use axum::{
    extract::{Path, State},
    http::Uri,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state that is accessible across all request handlers
///
/// The reader only holds a read-only store handle, so cloning the state per
/// request is cheap and requests never contend.
#[derive(Clone)]
pub struct AppState {
    reader: BatchReader,
}

/// The main API server struct
///
/// Encapsulates the listen address and application state.
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listen address settings
    /// * `store` - The ledger store every request reads from
    pub fn new(config: ApiConfig, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            config,
            state: AppState::new(store),
        }
    }

    /// Starts the API server and begins listening for incoming requests
    ///
    /// # Returns
    /// `Ok(())` when the server shuts down, or an error if binding fails
    pub async fn start(self) -> anyhow::Result<()> {
        let app = router(self.state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/batch/:batch_id", get(get_batch))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            reader: BatchReader::new(store),
        }
    }
}

/// `GET /api/batch/{batchId}`
///
/// Responds with the normalized document, or an `ApiError` body whose status
/// reflects the failure kind (400, 404, 503, 500).
async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchDocument>, ApiError> {
    info!("Received request for batch {}", batch_id);
    let document = state.reader.read(&batch_id).await?;
    Ok(Json(document))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.reader.backend_name(),
    })
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Not Found - {}", uri.path()))
}
