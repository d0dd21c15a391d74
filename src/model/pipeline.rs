//! Fraud Pipeline - fitted preprocessing bundled with the classifier
//!
//! This is the unit persisted by training and loaded by the service. The
//! feature layout it was fitted on travels with it.

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::features::{LayoutInfo, FEATURE_COUNT};
use super::forest::{ForestParams, RandomForest};
use super::preprocess::Preprocessor;
use super::threshold::ThresholdConfig;
use super::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudPipeline {
    pub layout: LayoutInfo,
    pub trained_at: DateTime<Utc>,
    pub preprocessor: Preprocessor,
    pub classifier: RandomForest,
}

impl FraudPipeline {
    /// Fit preprocessing on `x`, then the forest on the transformed rows
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: ForestParams) -> Result<Self, ModelError> {
        if x.ncols() != FEATURE_COUNT {
            return Err(ModelError::FeatureCountMismatch {
                component: "the pipeline",
                expected: FEATURE_COUNT,
                found: x.ncols(),
            });
        }

        let preprocessor = Preprocessor::fit(x)?;
        let scaled = preprocessor.transform(x)?;
        let classifier = RandomForest::fit(scaled.view(), y, params)?;

        Ok(Self {
            layout: LayoutInfo::current(),
            trained_at: Utc::now(),
            preprocessor,
            classifier,
        })
    }

    /// Impute + scale
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        self.preprocessor.transform(x)
    }

    /// Positive-class probability per row of raw (unscaled) features
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ModelError> {
        let scaled = self.transform(x)?;
        self.classifier.predict_proba(scaled.view())
    }

    pub fn predict(&self, x: ArrayView2<f64>, threshold: &ThresholdConfig) -> Result<Vec<u8>, ModelError> {
        let scaled = self.transform(x)?;
        self.classifier.predict(scaled.view(), threshold)
    }

    /// Mean accuracy on `x` against `y`
    pub fn score(&self, x: ArrayView2<f64>, y: &[u8], threshold: &ThresholdConfig) -> Result<f64, ModelError> {
        if y.len() != x.nrows() {
            return Err(ModelError::LabelCountMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        let predicted = self.predict(x, threshold)?;
        let correct = predicted.iter().zip(y).filter(|(p, t)| p == t).count();
        Ok(correct as f64 / y.len() as f64)
    }

    /// Check a deserialized pipeline against the running feature layout
    pub fn validate(&self) -> Result<(), ModelError> {
        self.layout.validate()?;

        let widths = [
            ("the imputer", self.preprocessor.imputer.n_features()),
            ("the scaler", self.preprocessor.scaler.n_features()),
            ("RandomForest", self.classifier.n_features),
        ];
        for (component, width) in widths {
            if width != FEATURE_COUNT {
                return Err(ModelError::FeatureCountMismatch {
                    component,
                    expected: FEATURE_COUNT,
                    found: width,
                });
            }
        }

        self.classifier.validate()
    }
}
