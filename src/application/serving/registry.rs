use crate::application::ml::pipeline::TrainedArtifact;
use crate::application::serving::manifest::{ServingManifest, ServingTask};
use crate::domain::dataset::TaskKind;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::metrics::Metric;
use crate::domain::topic::TopicKey;
use crate::infrastructure::artifact_store::ArtifactStore;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Read-only routing table from task/topic to a loaded artifact.
///
/// Built once at startup and shared behind an `Arc`; never mutated after.
pub struct ArtifactRegistry<M> {
    movement: Option<Arc<TrainedArtifact<M>>>,
    sentiment: Option<Arc<TrainedArtifact<M>>>,
    relevance: HashMap<TopicKey, Arc<TrainedArtifact<M>>>,
}

impl<M> Default for ArtifactRegistry<M> {
    fn default() -> Self {
        Self {
            movement: None,
            sentiment: None,
            relevance: HashMap::new(),
        }
    }
}

impl<M: DeserializeOwned> ArtifactRegistry<M> {
    /// Loads every artifact the manifest lists. Any missing or unreadable
    /// artifact fails the whole load, as does a classifier routed to a
    /// regression slot or the reverse.
    pub fn load(manifest: &ServingManifest, store: &ArtifactStore) -> PipelineResult<Self> {
        let mut registry = Self::default();

        if let Some(id) = manifest.artifact_for(ServingTask::Movement) {
            let artifact = load_checked(store, id, TaskKind::Classification, "movement")?;
            registry.movement = Some(Arc::new(artifact));
            info!("Loaded movement model {}", id);
        }
        if let Some(id) = manifest.artifact_for(ServingTask::Sentiment) {
            let artifact = load_checked(store, id, TaskKind::Regression, "sentiment")?;
            registry.sentiment = Some(Arc::new(artifact));
            info!("Loaded sentiment model {}", id);
        }
        for (topic, id) in &manifest.relevance {
            let route = format!("relevance topic \"{}\"", topic);
            let artifact = load_checked(store, id, TaskKind::Regression, &route)?;
            registry.relevance.insert(topic.clone(), Arc::new(artifact));
            info!("Loaded relevance model {} for topic \"{}\"", id, topic);
        }

        Ok(registry)
    }
}

fn load_checked<M: DeserializeOwned>(
    store: &ArtifactStore,
    id: &str,
    expected: TaskKind,
    route: &str,
) -> PipelineResult<TrainedArtifact<M>> {
    let artifact: TrainedArtifact<M> = store.load(id)?;
    let actual = match artifact.metric {
        Metric::Accuracy { .. } => TaskKind::Classification,
        Metric::Regression { .. } => TaskKind::Regression,
    };
    if actual != expected {
        return Err(PipelineError::Config(format!(
            "artifact {} is a {:?} model but {} needs {:?}",
            id, actual, route, expected
        )));
    }
    Ok(artifact)
}

impl<M> ArtifactRegistry<M> {
    pub fn with_task(mut self, task: ServingTask, artifact: TrainedArtifact<M>) -> Self {
        let artifact = Some(Arc::new(artifact));
        match task {
            ServingTask::Movement => self.movement = artifact,
            ServingTask::Sentiment => self.sentiment = artifact,
        }
        self
    }

    pub fn with_topic(mut self, topic: TopicKey, artifact: TrainedArtifact<M>) -> Self {
        self.relevance.insert(topic, Arc::new(artifact));
        self
    }

    pub fn task(&self, task: ServingTask) -> PipelineResult<Arc<TrainedArtifact<M>>> {
        let slot = match task {
            ServingTask::Movement => &self.movement,
            ServingTask::Sentiment => &self.sentiment,
        };
        slot.clone()
            .ok_or_else(|| PipelineError::UnknownTask(task.to_string()))
    }

    pub fn topic(&self, topic: &TopicKey) -> PipelineResult<Arc<TrainedArtifact<M>>> {
        self.relevance
            .get(topic)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownTopic(topic.to_string()))
    }

    /// Served topics, sorted.
    pub fn topics(&self) -> Vec<&TopicKey> {
        let mut topics: Vec<&TopicKey> = self.relevance.keys().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        usize::from(self.movement.is_some()) + usize::from(self.sentiment.is_some()) + self.relevance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
