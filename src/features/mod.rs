//! Feature schema and tabular input

pub mod layout;
pub mod frame;

pub use layout::{
    FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION, PREDICTION_COLUMN, PROBABILITY_COLUMN,
    LayoutInfo, LayoutMismatchError, layout_hash, validate_layout,
};
pub use frame::{FeatureFrame, FrameError, LabeledFrame};
