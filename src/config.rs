//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Output format for the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Fitted pipeline artifact loaded at startup
    pub model_path: PathBuf,

    /// Rows returned per prediction response
    pub preview_rows: usize,

    /// Probability above which a row is labeled fraud
    pub decision_threshold: f64,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            model_path: PathBuf::from("models/fraud_model.json"),
            preview_rows: 5,
            decision_threshold: 0.5,
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut config = Self {
            port: parse_var("PORT").unwrap_or(defaults.port),

            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            preview_rows: parse_var("PREVIEW_ROWS").unwrap_or(defaults.preview_rows),

            decision_threshold: parse_var("DECISION_THRESHOLD").unwrap_or(defaults.decision_threshold),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),

            log_format: defaults.log_format,
        };
        let fallback = config.default_log_format();
        config.log_format = parse_var("LOG_FORMAT").unwrap_or(fallback);
        config
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Log format used when `LOG_FORMAT` is unset: JSON in production
    pub fn default_log_format(&self) -> LogFormat {
        if self.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Training job configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Labeled CSV dataset
    pub dataset_path: PathBuf,

    pub label_column: String,

    /// Directory receiving `fraud_model.json` and `scaler.json`
    pub models_dir: PathBuf,

    pub n_estimators: usize,

    pub random_state: u64,

    /// Held-out fraction for evaluation
    pub test_size: f64,

    pub log_format: LogFormat,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("creditcard.csv"),
            label_column: "Class".to_string(),
            models_dir: PathBuf::from("models"),
            n_estimators: 200,
            random_state: 42,
            test_size: 0.2,
            log_format: LogFormat::Pretty,
        }
    }
}

impl TrainingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dataset_path: env::var("DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),

            label_column: env::var("LABEL_COLUMN").unwrap_or(defaults.label_column),

            models_dir: env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),

            n_estimators: parse_var("N_ESTIMATORS").unwrap_or(defaults.n_estimators),

            random_state: parse_var("RANDOM_STATE").unwrap_or(defaults.random_state),

            test_size: parse_var("TEST_SIZE").unwrap_or(defaults.test_size),

            log_format: log_format_from_env(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join("fraud_model.json")
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.models_dir.join("scaler.json")
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn log_format_from_env() -> LogFormat {
    parse_var("LOG_FORMAT").unwrap_or(LogFormat::Pretty)
}
