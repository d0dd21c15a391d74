//! Random forest classifier
//!
//! Bagged CART trees with per-split feature subsampling. Class weights are
//! folded into the bootstrap sample weights so that both classes carry equal
//! total weight in expectation.

use ndarray::ArrayView2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::threshold::ThresholdConfig;
use super::tree::{DecisionTree, TreeParams};
use super::ModelError;

/// How many features each split may examine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => *k,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample weighs 1
    Uniform,
    /// `n_samples / (n_classes * count(class))`
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    pub bootstrap: bool,
    pub class_weight: ClassWeight,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    pub n_features: usize,
    /// Weight applied to class 0 and class 1 samples
    pub class_weights: [f64; 2],
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on `x` (rows × features) with 0/1 labels
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: ForestParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n == 0 {
            return Err(ModelError::EmptyInput { n_features: x.ncols() });
        }
        if y.len() != n {
            return Err(ModelError::LabelCountMismatch { rows: n, labels: y.len() });
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(ModelError::InvalidLabel(bad as f64));
        }
        if params.n_estimators == 0 {
            return Err(ModelError::InvalidParams("n_estimators must be at least 1".to_string()));
        }

        let positives = y.iter().filter(|&&l| l == 1).count();
        let counts = [n - positives, positives];
        if counts.contains(&0) {
            return Err(ModelError::SingleClass);
        }

        let class_weights = match params.class_weight {
            ClassWeight::Uniform => [1.0, 1.0],
            ClassWeight::Balanced => [
                n as f64 / (2.0 * counts[0] as f64),
                n as f64 / (2.0 * counts[1] as f64),
            ],
        };

        let tree_params = TreeParams {
            max_features: params.max_features.resolve(x.ncols()),
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_depth: params.max_depth,
        };

        // One seed per tree so the result does not depend on thread scheduling
        let mut master = StdRng::seed_from_u64(params.random_state);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        tracing::debug!(
            "Fitting {} trees on {} rows (class weights {:.4}/{:.4}, {} features per split)",
            params.n_estimators,
            n,
            class_weights[0],
            class_weights[1],
            tree_params.max_features
        );

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let weights = sample_weights(y, &class_weights, params.bootstrap, &mut rng);
                DecisionTree::fit(x, y, &weights, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            params,
            n_features: x.ncols(),
            class_weights,
            trees,
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean positive-class probability across trees, one per row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ModelError> {
        if x.ncols() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                component: "RandomForest",
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }

        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                (sum / n_trees).clamp(0.0, 1.0)
            })
            .collect())
    }

    /// Hard 0/1 labels at the given threshold
    pub fn predict(&self, x: ArrayView2<f64>, threshold: &ThresholdConfig) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| threshold.label(p))
            .collect())
    }

    /// Structural check after deserialization
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }
}

/// Bootstrap counts times class weight; out-of-bag rows get 0
fn sample_weights(y: &[u8], class_weights: &[f64; 2], bootstrap: bool, rng: &mut StdRng) -> Vec<f64> {
    let n = y.len();
    let mut counts = vec![if bootstrap { 0.0 } else { 1.0 }; n];
    if bootstrap {
        for _ in 0..n {
            counts[rng.gen_range(0..n)] += 1.0;
        }
    }

    counts
        .iter()
        .zip(y)
        .map(|(c, &label)| c * class_weights[label as usize])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Two clusters on feature 0; feature 1 is noise
    fn clusters(n: usize) -> (Array2<f64>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(3);
        let mut y = Vec::with_capacity(n);
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let positive = i % 5 == 0;
            if j == 0 {
                let centre = if positive { 4.0 } else { -4.0 };
                centre + rng.gen_range(-1.0..1.0)
            } else {
                rng.gen_range(-1.0..1.0)
            }
        });
        for i in 0..n {
            y.push(u8::from(i % 5 == 0));
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(30), 5);
        assert_eq!(MaxFeatures::Log2.resolve(30), 4);
        assert_eq!(MaxFeatures::All.resolve(30), 30);
        assert_eq!(MaxFeatures::Fixed(100).resolve(30), 30);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_balanced_class_weights() {
        let (x, y) = clusters(50);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        // 40 negatives, 10 positives
        assert_eq!(forest.class_weights, [50.0 / 80.0, 50.0 / 20.0]);
        assert_eq!(forest.n_estimators(), 15);
    }

    #[test]
    fn test_separates_clusters() {
        let (x, y) = clusters(100);
        let params = ForestParams {
            max_features: MaxFeatures::All,
            ..small_params()
        };
        let forest = RandomForest::fit(x.view(), &y, params).unwrap();
        let proba = forest.predict_proba(x.view()).unwrap();

        for (p, &label) in proba.iter().zip(&y) {
            assert!((0.0..=1.0).contains(p));
            assert_eq!(u8::from(*p > 0.5), label);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = clusters(60);
        let a = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        let b = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        assert_eq!(a, b);

        let other = ForestParams {
            random_state: 7,
            ..small_params()
        };
        let c = RandomForest::fit(x.view(), &y, other).unwrap();
        assert_ne!(a.trees, c.trees);
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, _) = clusters(10);
        let err = RandomForest::fit(x.view(), &[0; 10], small_params()).unwrap_err();
        assert!(matches!(err, ModelError::SingleClass));
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = clusters(20);
        let forest = RandomForest::fit(x.view(), &y, small_params()).unwrap();
        let wide = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            forest.predict_proba(wide.view()),
            Err(ModelError::FeatureCountMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn test_sample_weights_without_bootstrap() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = sample_weights(&[0, 1, 1], &[0.5, 2.0], false, &mut rng);
        assert_eq!(w, vec![0.5, 2.0, 2.0]);

        let w = sample_weights(&[0, 1, 1], &[1.0, 1.0], true, &mut rng);
        assert_eq!(w.iter().sum::<f64>(), 3.0);
    }
}
