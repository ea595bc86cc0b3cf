//! Training configuration parsing from environment variables.
//!
//! This module handles dataset locations, split and cross-validation
//! settings, vectorizer options and output directories.

use super::{parse_env, parse_optional_env};
use crate::application::ml::vectorizer::{StopWords, VectorizerConfig};
use crate::application::training::search::{DEFAULT_K_FOLDS, Parallelism};
use crate::application::training::session::SessionConfig;
use crate::domain::dataset::{DEFAULT_MAX_ROWS, DEFAULT_TEST_FRACTION};
use anyhow::{Result, bail};
use std::env;
use std::path::PathBuf;

/// Training environment configuration
#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    // Storage
    pub artifact_dir: PathBuf,
    pub feature_cache_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub report_dir: PathBuf,

    // Datasets
    pub movement_dataset: PathBuf,
    pub sentiment_dataset: PathBuf,
    pub relevance_dataset: PathBuf,
    pub max_rows: usize,

    // Split & search
    pub test_fraction: f64,
    pub split_seed: Option<u64>,
    pub cv_folds: usize,
    /// 0 uses every core.
    pub training_threads: usize,
    pub grid_config: Option<PathBuf>,

    // Feature extraction
    pub max_features: usize,
    pub stop_words: StopWords,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            feature_cache_dir: PathBuf::from("models/features"),
            manifest_path: PathBuf::from("models/serving.toml"),
            report_dir: PathBuf::from("reports"),
            movement_dataset: PathBuf::from("data/articles.csv"),
            sentiment_dataset: PathBuf::from("data/sentiment.csv"),
            relevance_dataset: PathBuf::from("data/relevance.csv"),
            max_rows: DEFAULT_MAX_ROWS,
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: None,
            cv_folds: DEFAULT_K_FOLDS,
            training_threads: 0,
            grid_config: None,
            max_features: VectorizerConfig::default().max_features,
            stop_words: StopWords::English,
        }
    }
}

fn path_var(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn parse_stop_words(raw: &str) -> Result<StopWords> {
    match raw.trim().to_lowercase().as_str() {
        "english" => Ok(StopWords::English),
        "none" | "" => Ok(StopWords::None),
        other if other.contains(',') || !other.contains(' ') => Ok(StopWords::Custom(
            other
                .split(',')
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        )),
        other => bail!(
            "Invalid STOP_WORDS: {}. Must be 'english', 'none' or a comma-separated list",
            other
        ),
    }
}

impl TrainingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let artifact_dir = path_var("ARTIFACT_DIR", defaults.artifact_dir);
        let feature_cache_dir = path_var("FEATURE_CACHE_DIR", artifact_dir.join("features"));

        let test_fraction = parse_env("TEST_FRACTION", defaults.test_fraction)?;
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            bail!("TEST_FRACTION must be in (0, 1), got {}", test_fraction);
        }
        let cv_folds = parse_env("CV_FOLDS", defaults.cv_folds)?;
        if cv_folds < 2 {
            bail!("CV_FOLDS must be at least 2, got {}", cv_folds);
        }

        Ok(Self {
            manifest_path: path_var("MANIFEST_PATH", artifact_dir.join("serving.toml")),
            report_dir: path_var("REPORT_DIR", defaults.report_dir),
            movement_dataset: path_var("MOVEMENT_DATASET_PATH", defaults.movement_dataset),
            sentiment_dataset: path_var("SENTIMENT_DATASET_PATH", defaults.sentiment_dataset),
            relevance_dataset: path_var("RELEVANCE_DATASET_PATH", defaults.relevance_dataset),
            max_rows: parse_env("MAX_ROWS", defaults.max_rows)?,
            test_fraction,
            split_seed: parse_optional_env("SPLIT_SEED")?,
            cv_folds,
            training_threads: parse_env("TRAINING_THREADS", defaults.training_threads)?,
            grid_config: env::var("GRID_CONFIG").ok().map(PathBuf::from),
            max_features: parse_env("MAX_FEATURES", defaults.max_features)?,
            stop_words: match env::var("STOP_WORDS") {
                Ok(raw) => parse_stop_words(&raw)?,
                Err(_) => defaults.stop_words,
            },
            artifact_dir,
            feature_cache_dir,
        })
    }

    pub fn parallelism(&self) -> Parallelism {
        match self.training_threads {
            0 => Parallelism::AllCores,
            1 => Parallelism::Sequential,
            n => Parallelism::Threads(n),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            test_fraction: self.test_fraction,
            seed: self.split_seed,
            vectorizer: VectorizerConfig {
                max_features: self.max_features,
                stop_words: self.stop_words.clone(),
            },
        }
    }
}
