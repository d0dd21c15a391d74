//! Transaction feature schema
//!
//! The 30 columns the pipeline is fitted on, in the order the model reads
//! them. Any change to the list or its order must bump `FEATURE_VERSION`;
//! persisted artifacts carry the version and CRC32 layout hash and are
//! refused on load when either differs.

use std::sync::OnceLock;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

pub const FEATURE_VERSION: u8 = 1;

/// `Time`, the PCA components `V1..V28`, then `Amount`
pub const FEATURE_LAYOUT: &[&str] = &[
    "Time",
    "V1", "V2", "V3", "V4", "V5", "V6", "V7",
    "V8", "V9", "V10", "V11", "V12", "V13", "V14",
    "V15", "V16", "V17", "V18", "V19", "V20", "V21",
    "V22", "V23", "V24", "V25", "V26", "V27", "V28",
    "Amount",
];

/// Must equal `FEATURE_LAYOUT.len()`
pub const FEATURE_COUNT: usize = 30;

/// Column appended to scored rows holding the 0/1 label
pub const PREDICTION_COLUMN: &str = "Fraud_Prediction";

/// Column appended to scored rows holding the positive-class probability
pub const PROBABILITY_COLUMN: &str = "Fraud_Probability";

/// CRC32 over the version byte and the NUL-terminated names
pub fn layout_hash() -> u32 {
    static HASH: OnceLock<u32> = OnceLock::new();
    *HASH.get_or_init(|| {
        let mut hasher = Hasher::new();
        hasher.update(&[FEATURE_VERSION]);
        FEATURE_LAYOUT.iter().for_each(|name| {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        });
        hasher.finalize()
    })
}

/// Layout descriptor stored alongside fitted artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        LayoutInfo {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.hash)
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        LayoutInfo::current()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Feature layout mismatch: artifact has v{actual_version} ({actual_hash:08x}), \
     this build expects v{expected_version} ({expected_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let expected = layout_hash();
    if version == FEATURE_VERSION && hash == expected {
        return Ok(());
    }
    Err(LayoutMismatchError {
        expected_version: FEATURE_VERSION,
        expected_hash: expected,
        actual_version: version,
        actual_hash: hash,
    })
}

/// Column position of `name` in the layout
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

/// Feature names absent from `headers`, in layout order
pub fn missing_columns<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    FEATURE_LAYOUT
        .iter()
        .filter(|name| !headers.iter().any(|h| h.as_ref() == **name))
        .map(|name| name.to_string())
        .collect()
}
