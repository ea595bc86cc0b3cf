use crate::domain::dataset::TaskKind;
use crate::domain::errors::{EstimatorError, PipelineResult};
use crate::domain::ml::params::ParamSet;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Byte storage keyed by name. Backs both the feature cache and the
/// artifact store.
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    fn read(&self, key: &str) -> PipelineResult<Option<Vec<u8>>>;
    fn write(&self, key: &str, bytes: &[u8]) -> PipelineResult<()>;
    /// Returns whether something was removed.
    fn remove(&self, key: &str) -> PipelineResult<bool>;
    fn keys(&self) -> PipelineResult<Vec<String>>;

    fn exists(&self, key: &str) -> PipelineResult<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// A fitted model mapping dense feature rows to one output per row.
///
/// Classifiers return class labels as `0.0`/`1.0`.
pub trait Predictor: Send + Sync {
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError>;
}

/// A trainable estimator family with its own hyperparameters.
pub trait EstimatorFamily: Send + Sync {
    type Model: Predictor + Serialize + DeserializeOwned;

    /// Stable snake_case name used in artifact ids.
    fn name(&self) -> &str;

    fn task(&self) -> TaskKind;

    fn fit(&self, x: &[Vec<f64>], y: &[f64], params: &ParamSet) -> Result<Self::Model, EstimatorError>;
}
