//! Training job - load, split, fit, evaluate, save

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use ndarray::{Array2, Axis};

use crate::config::TrainingConfig;
use crate::features::{FrameError, LabeledFrame};
use crate::model::{
    roc_auc_score, save_pipeline, save_scaler, stratified_split, ClassificationReport, ForestParams,
    FraudPipeline, ModelError, ThresholdConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Row {row}: label is missing")]
    MissingLabel { row: usize },

    #[error("Row {row}: label {value} is not 0 or 1")]
    InvalidLabel { row: usize, value: f64 },
}

/// Feature matrix in layout order plus 0/1 labels
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Vec<u8>,
}

impl Dataset {
    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn n_fraud(&self) -> usize {
        self.y.iter().filter(|&&l| l == 1).count()
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

/// Parse a labeled CSV
pub fn read_dataset<R: Read>(reader: R, label: &str) -> Result<Dataset, TrainingError> {
    let frame = LabeledFrame::from_reader(reader, label)?;

    let y = frame
        .labels
        .iter()
        .enumerate()
        .map(|(i, value)| match value {
            Some(v) if *v == 0.0 => Ok(0),
            Some(v) if *v == 1.0 => Ok(1),
            Some(v) => Err(TrainingError::InvalidLabel { row: i + 1, value: *v }),
            None => Err(TrainingError::MissingLabel { row: i + 1 }),
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(Dataset {
        x: frame.features.to_matrix(),
        y,
    })
}

pub fn load_dataset(path: &Path, label: &str) -> anyhow::Result<Dataset> {
    let file = File::open(path).with_context(|| format!("Failed to open dataset {}", path.display()))?;
    read_dataset(BufReader::new(file), label).with_context(|| format!("Failed to read dataset {}", path.display()))
}

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub report: ClassificationReport,
    pub roc_auc: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub model_path: PathBuf,
    pub model_sha256: String,
    pub scaler_path: PathBuf,
}

pub fn run(config: &TrainingConfig) -> anyhow::Result<TrainingSummary> {
    let dataset = load_dataset(&config.dataset_path, &config.label_column)?;
    tracing::info!(
        "Loaded {} rows from {} ({} fraud)",
        dataset.n_rows(),
        config.dataset_path.display(),
        dataset.n_fraud()
    );

    let split = stratified_split(&dataset.y, config.test_size, config.random_state)?;
    let train = dataset.select(&split.train);
    let test = dataset.select(&split.test);
    tracing::info!("Split: {} train / {} test rows", train.n_rows(), test.n_rows());

    let params = ForestParams {
        n_estimators: config.n_estimators,
        random_state: config.random_state,
        ..Default::default()
    };

    let fit_start = Instant::now();
    let pipeline = FraudPipeline::fit(train.x.view(), &train.y, params)?;
    tracing::info!(
        "Fitted {} trees in {:.2?}",
        pipeline.classifier.n_estimators(),
        fit_start.elapsed()
    );

    // Held-out evaluation
    let threshold = ThresholdConfig::default();
    let probabilities = pipeline.predict_proba(test.x.view())?;
    let predicted: Vec<u8> = probabilities.iter().map(|&p| threshold.label(p)).collect();
    let report = ClassificationReport::new(&test.y, &predicted)?;
    let roc_auc = roc_auc_score(&test.y, &probabilities)?;

    let model_path = config.model_path();
    let model_sha256 = save_pipeline(&pipeline, &model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;
    tracing::info!("Model saved: {} (sha256 {})", model_path.display(), model_sha256);

    let scaler_path = config.scaler_path();
    save_scaler(&pipeline.preprocessor.scaler, &scaler_path)
        .with_context(|| format!("Failed to save scaler to {}", scaler_path.display()))?;
    tracing::info!("Scaler saved: {}", scaler_path.display());

    Ok(TrainingSummary {
        report,
        roc_auc,
        n_train: train.n_rows(),
        n_test: test.n_rows(),
        model_path,
        model_sha256,
        scaler_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_LAYOUT;
    use crate::model::load_pipeline;
    use crate::model::tests::synthetic_dataset;

    fn write_csv(path: &Path, x: &Array2<f64>, y: &[u8]) {
        let mut out = format!("{},Class\n", FEATURE_LAYOUT.join(","));
        for (row, label) in x.outer_iter().zip(y) {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            out.push_str(&format!("{},{}\n", cells.join(","), label));
        }
        std::fs::write(path, out).unwrap();
    }

    fn header_with_label() -> String {
        format!("{},Class", FEATURE_LAYOUT.join(","))
    }

    fn zeros() -> String {
        vec!["0"; FEATURE_LAYOUT.len()].join(",")
    }

    #[test]
    fn test_read_dataset_labels() {
        let csv = format!("{}\n{},1.0\n{},0\n", header_with_label(), zeros(), zeros());
        let dataset = read_dataset(csv.as_bytes(), "Class").unwrap();

        assert_eq!(dataset.y, vec![1, 0]);
        assert_eq!(dataset.x.dim(), (2, 30));
        assert_eq!(dataset.n_fraud(), 1);
    }

    #[test]
    fn test_read_dataset_rejects_bad_label() {
        let csv = format!("{}\n{},0\n{},2\n", header_with_label(), zeros(), zeros());

        match read_dataset(csv.as_bytes(), "Class") {
            Err(TrainingError::InvalidLabel { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, 2.0);
            }
            other => panic!("Expected InvalidLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_read_dataset_requires_label_column() {
        let csv = format!("{}\n{}\n", FEATURE_LAYOUT.join(","), zeros());
        let err = read_dataset(csv.as_bytes(), "Class").unwrap_err();
        assert_eq!(err.to_string(), "\"['Class'] not found in axis\"");
    }

    #[test]
    fn test_read_dataset_missing_label_value() {
        let csv = format!("{}\n{},\n", header_with_label(), zeros());
        assert!(matches!(
            read_dataset(csv.as_bytes(), "Class"),
            Err(TrainingError::MissingLabel { row: 1 })
        ));
    }

    #[test]
    fn test_select_rows() {
        let csv = format!("{}\n{},1\n{},0\n{},1\n", header_with_label(), zeros(), zeros(), zeros());
        let dataset = read_dataset(csv.as_bytes(), "Class").unwrap();

        let picked = dataset.select(&[2, 1]);
        assert_eq!(picked.y, vec![1, 0]);
        assert_eq!(picked.x.nrows(), 2);
    }

    #[test]
    fn test_run_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_path = dir.path().join("creditcard.csv");
        let (x, y) = synthetic_dataset(80, 20, 17);
        write_csv(&dataset_path, &x, &y);

        let config = TrainingConfig {
            dataset_path,
            models_dir: dir.path().join("models"),
            n_estimators: 10,
            ..Default::default()
        };
        let summary = run(&config).unwrap();

        assert_eq!(summary.n_test, 20);
        assert_eq!(summary.n_train, 80);
        assert_eq!(summary.report.total(), 20);
        assert_eq!(summary.report.classes[1].support, 4);
        assert!(summary.roc_auc > 0.9);
        assert!(summary.scaler_path.exists());

        let loaded = load_pipeline(&summary.model_path).unwrap();
        assert_eq!(loaded.sha256, summary.model_sha256);
        assert_eq!(loaded.pipeline.classifier.n_estimators(), 10);
    }

    #[test]
    fn test_run_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_path = dir.path().join("creditcard.csv");
        let (x, y) = synthetic_dataset(60, 15, 23);
        write_csv(&dataset_path, &x, &y);

        let config = |models: &str| TrainingConfig {
            dataset_path: dataset_path.clone(),
            models_dir: dir.path().join(models),
            n_estimators: 5,
            ..Default::default()
        };
        let a = run(&config("a")).unwrap();
        let b = run(&config("b")).unwrap();

        let a = load_pipeline(&a.model_path).unwrap().pipeline;
        let b = load_pipeline(&b.model_path).unwrap().pipeline;
        assert_eq!(a.classifier, b.classifier);
        assert_eq!(a.preprocessor, b.preprocessor);
    }

    #[test]
    fn test_run_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            dataset_path: dir.path().join("absent.csv"),
            models_dir: dir.path().join("models"),
            ..Default::default()
        };
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to open dataset"));
    }
}
