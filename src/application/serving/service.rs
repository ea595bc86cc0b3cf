//! Request-time inference over the artifact registry.
//!
//! Model evaluation is CPU-bound, so each prediction runs on the blocking
//! pool and is abandoned once the per-request timeout elapses. An abandoned
//! prediction keeps its concurrency permit until it actually finishes, so
//! at most `max_concurrency` inferences occupy the blocking pool at once.

use crate::application::ml::pipeline::TrainedArtifact;
use crate::application::serving::manifest::ServingTask;
use crate::application::serving::registry::ArtifactRegistry;
use crate::domain::errors::{EstimatorError, PipelineError, PipelineResult};
use crate::domain::ports::Predictor;
use crate::domain::topic::TopicKey;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_CONCURRENT_INFERENCES: usize = 16;

/// Predicted next-day direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    Up,
    Down,
}

impl Movement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Movement::Up => "up",
            Movement::Down => "down",
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<f64> for Movement {
    type Error = EstimatorError;

    fn try_from(label: f64) -> Result<Self, Self::Error> {
        if label == 1.0 {
            Ok(Movement::Up)
        } else if label == 0.0 {
            Ok(Movement::Down)
        } else {
            Err(EstimatorError::PredictFailed(format!(
                "movement model returned non-binary label {}",
                label
            )))
        }
    }
}

pub struct PredictionService<M> {
    registry: Arc<ArtifactRegistry<M>>,
    timeout: Duration,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl<M: Predictor + 'static> PredictionService<M> {
    pub fn new(registry: Arc<ArtifactRegistry<M>>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_INFERENCES)),
            max_concurrency: DEFAULT_MAX_CONCURRENT_INFERENCES,
        }
    }

    /// Caps the number of inferences running on the blocking pool. Requests
    /// beyond the cap wait for a permit within their own timeout.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.permits = Arc::new(Semaphore::new(limit));
        self.max_concurrency = limit;
        self
    }

    /// Inferences currently holding a permit, including abandoned ones that
    /// are still running.
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.permits.available_permits()
    }

    pub fn registry(&self) -> &ArtifactRegistry<M> {
        &self.registry
    }

    pub async fn predict_movement(&self, text: String) -> PipelineResult<Movement> {
        let artifact = self.registry.task(ServingTask::Movement)?;
        let label = self.infer(artifact, text).await?;
        Ok(Movement::try_from(label)?)
    }

    pub async fn predict_sentiment(&self, text: String) -> PipelineResult<f64> {
        let artifact = self.registry.task(ServingTask::Sentiment)?;
        finite(self.infer(artifact, text).await?)
    }

    pub async fn predict_relevance(&self, text: String, topic: &str) -> PipelineResult<f64> {
        let artifact = self.registry.topic(&TopicKey::new(topic))?;
        finite(self.infer(artifact, text).await?)
    }

    async fn infer(&self, artifact: Arc<TrainedArtifact<M>>, text: String) -> PipelineResult<f64> {
        let family = artifact.family.clone();
        let permits = self.permits.clone();
        let task = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Internal(format!("inference permits closed: {}", e)))?;
            Ok::<_, PipelineError>(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                artifact.pipeline.predict_one(&text)
            })
            .await)
        };

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!("{} inference abandoned after {:?}", family, self.timeout);
                Err(PipelineError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(Err(join_error))) => Err(PipelineError::Internal(format!(
                "inference task for {} failed: {}",
                family, join_error
            ))),
            Ok(Ok(Ok(prediction))) => {
                let value = prediction?;
                debug!("{} predicted {}", family, value);
                Ok(value)
            }
        }
    }
}

fn finite(value: f64) -> PipelineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EstimatorError::PredictFailed(format!("non-finite prediction {}", value)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::pipeline::Pipeline;
    use crate::application::ml::vectorizer::{TfidfVectorizer, VectorizerConfig};
    use crate::domain::ml::metrics::Metric;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Fixed {
        value: f64,
        delay_ms: u64,
    }

    impl Predictor for Fixed {
        fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
            Ok(vec![self.value; x.len()])
        }
    }

    fn artifact(value: f64, delay_ms: u64) -> TrainedArtifact<Fixed> {
        let transform =
            TfidfVectorizer::fit(&["bank earnings beat", "bank loan losses"], &VectorizerConfig::default())
                .unwrap();
        TrainedArtifact {
            family: "fixed".to_string(),
            metric: Metric::Accuracy { accuracy: 1.0 },
            pipeline: Pipeline::new(transform, Fixed { value, delay_ms }),
        }
    }

    fn service(registry: ArtifactRegistry<Fixed>) -> PredictionService<Fixed> {
        PredictionService::new(Arc::new(registry), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_movement_maps_labels() {
        let up = service(ArtifactRegistry::default().with_task(ServingTask::Movement, artifact(1.0, 0)));
        assert_eq!(up.predict_movement("bank earnings".to_string()).await.unwrap(), Movement::Up);

        let down = service(ArtifactRegistry::default().with_task(ServingTask::Movement, artifact(0.0, 0)));
        assert_eq!(down.predict_movement("bank".to_string()).await.unwrap(), Movement::Down);
    }

    #[tokio::test]
    async fn test_unknown_topic_and_task() {
        let svc = service(
            ArtifactRegistry::default().with_topic(TopicKey::new("finance"), artifact(0.4, 0)),
        );

        assert_eq!(
            svc.predict_relevance("bank".to_string(), "Finance").await.unwrap(),
            0.4
        );
        assert!(matches!(
            svc.predict_relevance("bank".to_string(), "sports").await,
            Err(PipelineError::UnknownTopic(_))
        ));
        assert!(matches!(
            svc.predict_sentiment("bank".to_string()).await,
            Err(PipelineError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_non_finite_prediction_is_error() {
        let svc = service(
            ArtifactRegistry::default().with_topic(TopicKey::new("finance"), artifact(f64::NAN, 0)),
        );
        assert!(matches!(
            svc.predict_relevance("bank".to_string(), "finance").await,
            Err(PipelineError::Estimator(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_inference_times_out() {
        let svc = service(ArtifactRegistry::default().with_task(ServingTask::Sentiment, artifact(0.1, 1_000)));
        assert!(matches!(
            svc.predict_sentiment("bank".to_string()).await,
            Err(PipelineError::Timeout { after_ms: 200 })
        ));
    }

    #[tokio::test]
    async fn test_abandoned_inference_holds_its_permit() {
        let svc = service(ArtifactRegistry::default().with_task(ServingTask::Sentiment, artifact(0.1, 600)))
            .with_max_concurrency(1);

        assert!(matches!(
            svc.predict_sentiment("bank".to_string()).await,
            Err(PipelineError::Timeout { .. })
        ));
        assert_eq!(svc.in_flight(), 1);

        // The only permit is still held by the abandoned call, so this one
        // never reaches the blocking pool.
        assert!(matches!(
            svc.predict_sentiment("bank".to_string()).await,
            Err(PipelineError::Timeout { .. })
        ));
        assert_eq!(svc.in_flight(), 1);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(svc.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_requests_wait_for_a_free_permit() {
        let svc = Arc::new(
            PredictionService::new(
                Arc::new(ArtifactRegistry::default().with_task(ServingTask::Sentiment, artifact(0.3, 50))),
                Duration::from_secs(2),
            )
            .with_max_concurrency(1),
        );

        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.predict_sentiment("bank".to_string()).await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.predict_sentiment("loan".to_string()).await }
        });

        assert_eq!(a.await.unwrap().unwrap(), 0.3);
        assert_eq!(b.await.unwrap().unwrap(), 0.3);
        assert_eq!(svc.in_flight(), 0);
    }
}
