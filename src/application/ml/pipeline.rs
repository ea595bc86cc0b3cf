use crate::application::ml::vectorizer::TfidfVectorizer;
use crate::domain::errors::EstimatorError;
use crate::domain::ml::metrics::Metric;
use crate::domain::ports::Predictor;
use serde::{Deserialize, Serialize};

/// Feature transform followed by a fitted model. Predicts straight from text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline<M> {
    pub transform: TfidfVectorizer,
    pub model: M,
}

impl<M: Predictor> Pipeline<M> {
    pub fn new(transform: TfidfVectorizer, model: M) -> Self {
        Self { transform, model }
    }

    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<f64>, EstimatorError> {
        let features = self.transform.transform_batch(texts);
        self.model.predict(&features)
    }

    pub fn predict_one(&self, text: &str) -> Result<f64, EstimatorError> {
        self.predict(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EstimatorError::PredictFailed("model returned no output".to_string()))
    }
}

/// Persisted unit: a pipeline tagged with its family and held-out metric.
///
/// Immutable once written; the artifact id is derived from `family` and
/// `metric`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact<M> {
    pub family: String,
    pub metric: Metric,
    pub pipeline: Pipeline<M>,
}

impl<M> TrainedArtifact<M> {
    pub fn id(&self) -> String {
        artifact_id(&self.family, &self.metric)
    }
}

/// `<family>_<metric fragment>`, e.g. `random_forest_accuracy_0.73`.
pub fn artifact_id(family: &str, metric: &Metric) -> String {
    format!("{}_{}", family, metric.name_fragment())
}
