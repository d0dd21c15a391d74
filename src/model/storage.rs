//! Artifact persistence - fitted pipeline and scaler as JSON files
//!
//! The pipeline is validated against the current feature layout on load,
//! and its SHA-256 fingerprint is returned on both save and load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::features::LayoutInfo;
use super::pipeline::FraudPipeline;
use super::preprocess::StandardScaler;
use super::ModelError;

/// A pipeline read from disk together with the digest of its bytes
#[derive(Debug, Clone)]
pub struct LoadedPipeline {
    pub pipeline: FraudPipeline,
    pub sha256: String,
    pub path: PathBuf,
}

/// The fitted scaler on its own, written next to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub layout: LayoutInfo,
    pub scaler: StandardScaler,
}

/// Hex SHA-256 of artifact bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Save pipeline to disk, replacing any existing file; returns its fingerprint
pub fn save_pipeline(pipeline: &FraudPipeline, path: &Path) -> Result<String, ModelError> {
    ensure_parent(path)?;

    let json = serde_json::to_vec(pipeline)?;
    fs::write(path, &json)?;
    Ok(fingerprint(&json))
}

/// Load pipeline from disk with layout and structure validation
pub fn load_pipeline(path: &Path) -> Result<LoadedPipeline, ModelError> {
    if !path.exists() {
        return Err(ModelError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Model artifact not found: {}", path.display()),
        )));
    }

    let data = fs::read(path)?;
    let pipeline: FraudPipeline = serde_json::from_slice(&data)?;
    pipeline.validate()?;

    Ok(LoadedPipeline {
        pipeline,
        sha256: fingerprint(&data),
        path: path.to_path_buf(),
    })
}

/// Save the fitted scaler alone
pub fn save_scaler(scaler: &StandardScaler, path: &Path) -> Result<(), ModelError> {
    ensure_parent(path)?;

    let artifact = ScalerArtifact {
        layout: LayoutInfo::current(),
        scaler: scaler.clone(),
    };
    fs::write(path, serde_json::to_vec_pretty(&artifact)?)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), ModelError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
