//! Offline training job
//!
//! Reads the labeled dataset, fits the pipeline, prints the held-out
//! evaluation and writes `fraud_model.json` / `scaler.json`.

use fraud_detection_api::{config::TrainingConfig, logging, training};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = TrainingConfig::from_env();

    logging::init(config.log_format);

    tracing::info!(
        "Training on {} ({} trees, seed {}, test size {})",
        config.dataset_path.display(),
        config.n_estimators,
        config.random_state,
        config.test_size
    );

    let summary = training::run(&config)?;

    println!("Classification Report:");
    println!("{}", summary.report);
    println!("ROC AUC SCORE: {}", summary.roc_auc);
    println!("Model saved: {}", summary.model_path.display());
    println!("Scaler saved: {}", summary.scaler_path.display());

    Ok(())
}
