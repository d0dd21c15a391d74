//! Model Module - fraud classification pipeline
//!
//! Preprocessing, the random forest, evaluation metrics and artifact storage.
//! Training fits a `FraudPipeline`; the service wraps the loaded pipeline in
//! an `InferenceEngine`.

pub mod preprocess;
pub mod tree;
pub mod forest;
pub mod pipeline;
pub mod inference;
pub mod threshold;
pub mod metrics;
pub mod split;
pub mod storage;


// Re-export common types
pub use forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
pub use inference::{EngineStatus, InferenceEngine, Prediction};
pub use metrics::{roc_auc_score, ClassificationReport};
pub use pipeline::FraudPipeline;
pub use preprocess::{MedianImputer, Preprocessor, StandardScaler};
pub use split::{stratified_split, SplitIndices};
pub use storage::{load_pipeline, save_pipeline, save_scaler, LoadedPipeline, ScalerArtifact};
pub use threshold::ThresholdConfig;

use crate::features::LayoutMismatchError;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Found array with 0 sample(s) (shape=(0, {n_features})) while a minimum of 1 is required.")]
    EmptyInput { n_features: usize },

    #[error("X has {found} features, but {component} is expecting {expected} features as input.")]
    FeatureCountMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Input X contains infinity or a value too large for dtype('float64').")]
    NonFinite,

    #[error("Found input variables with inconsistent numbers of samples: [{rows}, {labels}]")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("Label {0} is not 0 or 1")]
    InvalidLabel(f64),

    #[error("Training labels contain a single class; both 0 and 1 are required")]
    SingleClass,

    #[error("{0}")]
    InvalidParams(String),

    #[error("Model has no fitted trees")]
    NotFitted,

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
}
