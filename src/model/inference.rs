//! Inference Engine - scores feature rows against the loaded pipeline
//!
//! Built once at startup and shared read-only by every request. The only
//! mutable state is the latency counters, kept in atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, FEATURE_VERSION};
use super::pipeline::FraudPipeline;
use super::storage::{fingerprint, LoadedPipeline};
use super::threshold::ThresholdConfig;
use super::ModelError;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Prediction output for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 = fraud
    pub label: u8,
    /// Positive-class probability, 0.0 - 1.0
    pub probability: f64,
}

/// Engine Status for the health route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub sha256: String,
    pub trained_at: DateTime<Utc>,
    pub n_estimators: usize,
    pub feature_count: usize,
    pub layout_version: u8,
    pub layout_hash: String,
    pub decision_threshold: f64,
    pub avg_latency_ms: f64,
    pub inference_count: u64,
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug)]
pub struct InferenceEngine {
    pipeline: FraudPipeline,
    sha256: String,
    threshold: ThresholdConfig,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl InferenceEngine {
    pub fn new(loaded: LoadedPipeline, threshold: ThresholdConfig) -> Self {
        Self {
            pipeline: loaded.pipeline,
            sha256: loaded.sha256,
            threshold,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    /// Wrap an in-memory pipeline; the fingerprint covers its serialized form
    pub fn from_pipeline(pipeline: FraudPipeline, threshold: ThresholdConfig) -> Result<Self, ModelError> {
        let sha256 = fingerprint(&serde_json::to_vec(&pipeline)?);
        Ok(Self::new(
            LoadedPipeline {
                pipeline,
                sha256,
                path: Default::default(),
            },
            threshold,
        ))
    }

    pub fn pipeline(&self) -> &FraudPipeline {
        &self.pipeline
    }

    pub fn threshold(&self) -> ThresholdConfig {
        self.threshold
    }

    /// Transform then classify every row of raw features
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Prediction>, ModelError> {
        let start_time = Instant::now();

        let scaled = self.pipeline.transform(x)?;
        let probabilities = self.pipeline.classifier.predict_proba(scaled.view())?;

        let predictions: Vec<Prediction> = probabilities
            .into_iter()
            .map(|probability| Prediction {
                label: self.threshold.label(probability),
                probability,
            })
            .collect();

        let elapsed = start_time.elapsed().as_micros() as u64;
        self.latency_sum_us.fetch_add(elapsed, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Scored {} rows in {}us", predictions.len(), elapsed);

        Ok(predictions)
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

        EngineStatus {
            sha256: self.sha256.clone(),
            trained_at: self.pipeline.trained_at,
            n_estimators: self.pipeline.classifier.n_estimators(),
            feature_count: FEATURE_COUNT,
            layout_version: FEATURE_VERSION,
            layout_hash: format!("{:08x}", self.pipeline.layout.hash),
            decision_threshold: self.threshold.threshold,
            avg_latency_ms: avg,
            inference_count: count,
        }
    }
}
