//! CART decision tree for binary labels
//!
//! Gini impurity over weighted samples. Leaves store the weighted fraction of
//! the positive class, so a tree's output is already a probability.

use ndarray::{ArrayView1, ArrayView2};
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Feature values closer than this are not separated by a split
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Candidate features examined per split
    pub max_features: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_features: usize::MAX,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` with positive weight
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[u8],
        weights: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut samples: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        if samples.is_empty() {
            return Self {
                nodes: vec![Node::Leaf { probability: 0.0 }],
            };
        }

        let mut builder = Builder {
            x: x.reborrow(),
            y,
            weights,
            params,
            rng,
            features: (0..x.ncols()).collect(),
            scratch: Vec::with_capacity(samples.len()),
            nodes: Vec::new(),
        };
        builder.build(&mut samples);

        Self { nodes: builder.nodes }
    }

    /// Positive-class probability for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Structural check for deserialized trees: children always point forward
    pub fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidTree("tree has no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(ModelError::InvalidTree(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        )));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(ModelError::InvalidTree(format!(
                                "node {} has invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                Node::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(ModelError::InvalidTree(format!(
                            "leaf {} has probability {}",
                            idx, probability
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

struct Task {
    node: usize,
    start: usize,
    end: usize,
    depth: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    proxy: f64,
}

struct Builder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    features: Vec<usize>,
    scratch: Vec<(f64, u8, f64)>,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn build(&mut self, samples: &mut [usize]) {
        self.nodes.push(Node::Leaf { probability: 0.0 });
        let mut stack = vec![Task {
            node: 0,
            start: 0,
            end: samples.len(),
            depth: 0,
        }];

        while let Some(task) = stack.pop() {
            let range = &mut samples[task.start..task.end];
            let (w0, w1) = self.class_weights(range);
            let probability = if w0 + w1 > 0.0 { w1 / (w0 + w1) } else { 0.0 };

            let n = range.len();
            let is_leaf = w0 <= 0.0
                || w1 <= 0.0
                || n < self.params.min_samples_split
                || n < 2 * self.params.min_samples_leaf
                || self.params.max_depth.map_or(false, |d| task.depth >= d);

            let split = if is_leaf { None } else { self.find_split(range, w0, w1) };

            let Some(split) = split else {
                self.nodes[task.node] = Node::Leaf { probability };
                continue;
            };

            let x = self.x;
            let mid = partition(range, |i| x[[i, split.feature]] <= split.threshold);

            let left = self.nodes.len();
            let right = left + 1;
            self.nodes.push(Node::Leaf { probability: 0.0 });
            self.nodes.push(Node::Leaf { probability: 0.0 });
            self.nodes[task.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push(Task {
                node: right,
                start: task.start + mid,
                end: task.end,
                depth: task.depth + 1,
            });
            stack.push(Task {
                node: left,
                start: task.start,
                end: task.start + mid,
                depth: task.depth + 1,
            });
        }
    }

    fn class_weights(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(w0, w1), &i| {
            if self.y[i] == 1 {
                (w0, w1 + self.weights[i])
            } else {
                (w0 + self.weights[i], w1)
            }
        })
    }

    /// Best Gini split over a random subset of features.
    ///
    /// Constant features do not count toward `max_features`, and the search
    /// keeps going past the limit until some valid split is found.
    fn find_split(&mut self, samples: &[usize], w0: f64, w1: f64) -> Option<Split> {
        let (x, y, weights) = (self.x, self.y, self.weights);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = samples.len();

        self.features.shuffle(&mut *self.rng);

        let mut best: Option<Split> = None;
        let mut visited = 0;

        for f in 0..self.features.len() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            let feature = self.features[f];

            self.scratch.clear();
            self.scratch
                .extend(samples.iter().map(|&i| (x[[i, feature]], y[i], weights[i])));
            self.scratch.sort_by(|a, b| a.0.total_cmp(&b.0));

            if self.scratch[n - 1].0 <= self.scratch[0].0 + FEATURE_THRESHOLD {
                continue;
            }
            visited += 1;

            let (mut l0, mut l1) = (0.0, 0.0);
            for i in 0..n - 1 {
                let (value, label, weight) = self.scratch[i];
                if label == 1 {
                    l1 += weight;
                } else {
                    l0 += weight;
                }

                let next = self.scratch[i + 1].0;
                if next <= value + FEATURE_THRESHOLD {
                    continue;
                }
                let n_left = i + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                let (r0, r1) = (w0 - l0, w1 - l1);
                let (wl, wr) = (l0 + l1, r0 + r1);
                if wl <= 0.0 || wr <= 0.0 {
                    continue;
                }

                // Maximizing this is equivalent to minimizing weighted child Gini
                let proxy = (l0 * l0 + l1 * l1) / wl + (r0 * r0 + r1 * r1) / wr;
                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        proxy,
                    });
                }
            }
        }

        best
    }
}

/// Move items satisfying `pred` to the front; returns how many did
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..items.len() {
        if pred(items[i]) {
            items.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_separable_split_at_midpoint() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0, 0, 1, 1];
        let tree = DecisionTree::fit(x.view(), &y, &[1.0; 4], &TreeParams::default(), &mut rng());

        assert_eq!(tree.node_count(), 3);
        assert_eq!(
            tree.nodes[0],
            Node::Split {
                feature: 0,
                threshold: 1.5,
                left: 1,
                right: 2
            }
        );
        assert_eq!(tree.predict_row(array![0.2].view()), 0.0);
        assert_eq!(tree.predict_row(array![2.9].view()), 1.0);
    }

    #[test]
    fn test_pure_node_is_single_leaf() {
        let x = array![[0.0], [5.0]];
        let tree = DecisionTree::fit(x.view(), &[1, 1], &[1.0, 1.0], &TreeParams::default(), &mut rng());
        assert_eq!(tree.nodes, vec![Node::Leaf { probability: 1.0 }]);
    }

    #[test]
    fn test_leaf_probability_is_weighted() {
        // Identical rows cannot be split; the leaf mixes both labels by weight
        let x = array![[1.0], [1.0], [1.0]];
        let tree = DecisionTree::fit(x.view(), &[0, 0, 1], &[1.0, 1.0, 2.0], &TreeParams::default(), &mut rng());
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict_row(array![1.0].view()), 0.5);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = array![[0.0], [1.0], [2.0]];
        let tree = DecisionTree::fit(x.view(), &[0, 1, 1], &[1.0, 0.0, 1.0], &TreeParams::default(), &mut rng());
        // Split falls between 0 and 2, not between 0 and 1
        assert_eq!(tree.predict_row(array![0.9].view()), 0.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let params = TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(x.view(), &[0, 1, 0, 1], &[1.0; 4], &params, &mut rng());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(array![0.0].view()), 0.5);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { probability: 0.3 },
            ],
        };
        assert!(tree.validate(1).is_err());

        let fitted = DecisionTree::fit(
            array![[0.0], [1.0]].view(),
            &[0, 1],
            &[1.0, 1.0],
            &TreeParams::default(),
            &mut rng(),
        );
        assert!(fitted.validate(1).is_ok());
        assert!(fitted.validate(0).is_err());
    }
}
