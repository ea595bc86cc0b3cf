use crate::application::ml::feature_cache::FeatureCache;
use crate::application::ml::vectorizer::{TfidfVectorizer, VectorizerConfig};
use crate::domain::dataset::{DEFAULT_TEST_FRACTION, Dataset, LabeledRecord, Split, TaskKind};
use crate::domain::errors::PipelineResult;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub test_fraction: f64,
    /// Fixed seed for a reproducible split; `None` draws from the OS.
    pub seed: Option<u64>,
    /// Only used when the feature cache is empty.
    pub vectorizer: VectorizerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: None,
            vectorizer: VectorizerConfig::default(),
        }
    }
}

/// Everything the families of one training run share: the dataset, its
/// single train/test split, the feature transform fitted on the train side
/// and both feature matrices.
pub struct TrainingSession {
    dataset: Dataset,
    split: Split,
    transform: TfidfVectorizer,
    x_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
    x_test: Vec<Vec<f64>>,
    y_test: Vec<f64>,
}

fn texts(records: &[LabeledRecord]) -> Vec<&str> {
    records.iter().map(|r| r.text.as_str()).collect()
}

fn targets(records: &[LabeledRecord]) -> Vec<f64> {
    records.iter().map(|r| r.target).collect()
}

impl TrainingSession {
    pub fn prepare(dataset: Dataset, config: &SessionConfig, cache: &FeatureCache) -> PipelineResult<Self> {
        let split = Split::random(&dataset, config.test_fraction, config.seed)?;
        info!(
            "Prepared {:?} session: {} train / {} test records",
            dataset.task(),
            split.train.len(),
            split.test.len()
        );

        let train_texts = texts(&split.train);
        let transform = cache.get_or_build(&train_texts, &config.vectorizer)?;

        let x_train = transform.transform_batch(&train_texts);
        let x_test = transform.transform_batch(&texts(&split.test));
        let y_train = targets(&split.train);
        let y_test = targets(&split.test);

        Ok(Self {
            dataset,
            split,
            transform,
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }

    pub fn task(&self) -> TaskKind {
        self.dataset.task()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    pub fn transform(&self) -> &TfidfVectorizer {
        &self.transform
    }

    pub fn x_train(&self) -> &[Vec<f64>] {
        &self.x_train
    }

    pub fn y_train(&self) -> &[f64] {
        &self.y_train
    }

    pub fn x_test(&self) -> &[Vec<f64>] {
        &self.x_test
    }

    pub fn y_test(&self) -> &[f64] {
        &self.y_test
    }
}
