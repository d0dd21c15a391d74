//! Credit-card fraud detection
//!
//! A random forest training job (`train` binary) and the HTTP service that
//! scores uploaded CSV files against the persisted pipeline.
//!
//! # Architecture
//!
//! ```text
//! creditcard.csv ──► train ──► models/fraud_model.json ──► service
//!                                                          │
//!                          POST /predict-file (CSV) ──────►│──► predictions JSON
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod training;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use error::{AppError, AppResult};

use model::InferenceEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::home))
        .route("/health", get(handlers::health::check))
        .route("/predict-file", post(handlers::predict::predict_file))
        // Uploads are buffered whole
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                // Mirrors origin, methods and headers so credentials are allowed
                .layer(CorsLayer::very_permissive()),
        )
        .with_state(state)
}
