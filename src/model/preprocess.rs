//! Preprocessing - median imputation followed by standard scaling
//!
//! Both steps are fitted on the training split only and replayed unchanged at
//! scoring time.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Replaces missing (NaN) cells with the per-column median seen during fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    pub statistics: Vec<f64>,
}

impl MedianImputer {
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let statistics = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(col, column)| {
                let mut observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                median(&mut observed).unwrap_or_else(|| {
                    tracing::warn!("Column {} has no observed values, imputing 0", col);
                    0.0
                })
            })
            .collect();

        Self { statistics }
    }

    pub fn n_features(&self) -> usize {
        self.statistics.len()
    }

    pub fn transform_inplace(&self, x: &mut Array2<f64>) {
        for (mut column, &fill) in x.axis_iter_mut(Axis(1)).zip(&self.statistics) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
    }
}

/// Zero-mean / unit-variance scaling (population variance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub n_samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let n = x.nrows();
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());

        for column in x.axis_iter(Axis(1)) {
            let m = if n > 0 { column.sum() / n as f64 } else { 0.0 };
            let var = if n > 0 {
                column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64
            } else {
                0.0
            };
            let std = var.sqrt();

            mean.push(m);
            // Constant columns pass through unscaled
            scale.push(if std > f64::EPSILON * 10.0 { std } else { 1.0 });
        }

        Self {
            mean,
            scale,
            n_samples_seen: n,
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_inplace(&self, x: &mut Array2<f64>) {
        for (col, mut column) in x.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[col], self.scale[col]);
            column.mapv_inplace(|v| (v - m) / s);
        }
    }
}

/// Imputer then scaler, applied to the 30 canonical feature columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub imputer: MedianImputer,
    pub scaler: StandardScaler,
}

impl Preprocessor {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyInput { n_features: x.ncols() });
        }

        let imputer = MedianImputer::fit(x);
        let mut imputed = x.to_owned();
        imputer.transform_inplace(&mut imputed);
        check_finite(imputed.view())?;

        let scaler = StandardScaler::fit(imputed.view());
        Ok(Self { imputer, scaler })
    }

    pub fn n_features(&self) -> usize {
        self.imputer.n_features()
    }

    /// Impute and scale a copy of `x`
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::FeatureCountMismatch {
                component: "the preprocessor",
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        if x.nrows() == 0 {
            return Err(ModelError::EmptyInput { n_features: x.ncols() });
        }
        check_finite(x)?;

        let mut out = x.to_owned();
        self.imputer.transform_inplace(&mut out);
        self.scaler.transform_inplace(&mut out);
        Ok(out)
    }
}

fn check_finite(x: ArrayView2<f64>) -> Result<(), ModelError> {
    if x.iter().any(|v| v.is_infinite()) {
        return Err(ModelError::NonFinite);
    }
    Ok(())
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
