//! Fraud Detection API server
//!
//! Loads the fitted pipeline once and serves `/predict-file`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use fraud_detection_api::{
    config::Config,
    create_router, logging,
    model::{load_pipeline, InferenceEngine, ThresholdConfig},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    logging::init(config.log_format);

    tracing::info!("Fraud Detection API starting ({})...", config.environment);

    // Load the fitted pipeline
    let loaded = load_pipeline(&config.model_path)
        .with_context(|| format!("Failed to load model from {}", config.model_path.display()))?;

    tracing::info!(
        "Model loaded: {} (sha256 {}, {} trees, trained {})",
        loaded.path.display(),
        loaded.sha256,
        loaded.pipeline.classifier.n_estimators(),
        loaded.pipeline.trained_at
    );

    // Build application state
    let threshold = ThresholdConfig::new(config.decision_threshold);
    let state = AppState {
        engine: Arc::new(InferenceEngine::new(loaded, threshold)),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
