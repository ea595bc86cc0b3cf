//! Persistence of trained pipelines.
//!
//! Artifacts are stored as `<id>.json`, where the id is derived from the
//! family name and the rounded held-out metric. Two runs that land on the
//! same rounded metric share an id; the later save replaces the earlier
//! artifact without warning.

use crate::application::ml::pipeline::{Pipeline, TrainedArtifact, artifact_id};
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::metrics::Metric;
use crate::domain::ports::BlobStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

const ARTIFACT_EXTENSION: &str = ".json";

/// Borrowed form of [`TrainedArtifact`] with the same serialized layout.
#[derive(Serialize)]
struct ArtifactEnvelope<'a, M> {
    family: &'a str,
    metric: &'a Metric,
    pipeline: &'a Pipeline<M>,
}

#[derive(Clone)]
pub struct ArtifactStore {
    blobs: Arc<dyn BlobStore>,
}

impl ArtifactStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    fn key(id: &str) -> String {
        format!("{}{}", id, ARTIFACT_EXTENSION)
    }

    /// Persists `pipeline` and returns its artifact id.
    pub fn save<M: Serialize>(
        &self,
        pipeline: &Pipeline<M>,
        family: &str,
        metric: &Metric,
    ) -> PipelineResult<String> {
        let id = artifact_id(family, metric);
        let bytes = serde_json::to_vec(&ArtifactEnvelope {
            family,
            metric,
            pipeline,
        })?;
        self.blobs.write(&Self::key(&id), &bytes)?;
        info!("Model saved as {}{}", id, ARTIFACT_EXTENSION);
        Ok(id)
    }

    pub fn load<M: DeserializeOwned>(&self, id: &str) -> PipelineResult<TrainedArtifact<M>> {
        let bytes = self
            .blobs
            .read(&Self::key(id))?
            .ok_or_else(|| PipelineError::ArtifactNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn exists(&self, id: &str) -> PipelineResult<bool> {
        self.blobs.exists(&Self::key(id))
    }

    /// Ids of every stored artifact, sorted.
    pub fn list(&self) -> PipelineResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .blobs
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_suffix(ARTIFACT_EXTENSION).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Raw stored bytes of an artifact.
    pub fn read_bytes(&self, id: &str) -> PipelineResult<Vec<u8>> {
        self.blobs
            .read(&Self::key(id))?
            .ok_or_else(|| PipelineError::ArtifactNotFound(id.to_string()))
    }
}
