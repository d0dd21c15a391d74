//! Decision Threshold Configuration
//!
//! Turns a positive-class probability into the 0/1 fraud label.

use serde::{Deserialize, Serialize};

/// Probability above which a row is labeled fraud
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Decision threshold (0.0 - 1.0)
    pub threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    /// Out-of-range values are clamped, NaN falls back to the default
    pub fn new(threshold: f64) -> Self {
        if threshold.is_nan() {
            return Self::default();
        }
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Check if probability exceeds threshold
    pub fn is_fraud(&self, probability: f64) -> bool {
        probability > self.threshold
    }

    pub fn label(&self, probability: f64) -> u8 {
        u8::from(self.is_fraud(probability))
    }
}
