//! Serving manifest: which artifact answers which task.
//!
//! ```toml
//! movement = "random_forest_accuracy_0.73"
//! sentiment = "ridge_regression_mse_0.02_r2_0.22"
//!
//! [relevance]
//! technology = "technology_ridge_regression_mse_0.01_r2_0.31"
//! ```

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::topic::TopicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

/// Single-model serving tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingTask {
    Movement,
    Sentiment,
}

impl fmt::Display for ServingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingTask::Movement => f.write_str("movement"),
            ServingTask::Sentiment => f.write_str("sentiment"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServingManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub relevance: BTreeMap<TopicKey, String>,
}

impl ServingManifest {
    pub fn parse(content: &str) -> PipelineResult<Self> {
        let raw: ServingManifest =
            toml::from_str(content).map_err(|e| PipelineError::Config(format!("invalid manifest: {}", e)))?;
        // Re-key so hand-written topic names are normalized
        let relevance = raw
            .relevance
            .into_iter()
            .map(|(topic, id)| (TopicKey::new(topic.as_str()), id))
            .collect();
        Ok(Self { relevance, ..raw })
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read manifest {:?}: {}", path, e)))?;
        Self::parse(&content)
    }

    /// Empty manifest when the file does not exist yet.
    pub fn load_or_default(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("cannot serialize manifest: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        info!("Saved serving manifest to {:?}", path);
        Ok(())
    }

    pub fn artifact_for(&self, task: ServingTask) -> Option<&str> {
        match task {
            ServingTask::Movement => self.movement.as_deref(),
            ServingTask::Sentiment => self.sentiment.as_deref(),
        }
    }

    pub fn promote(&mut self, task: ServingTask, artifact_id: impl Into<String>) {
        let artifact_id = artifact_id.into();
        info!("Promoting {} for {}", artifact_id, task);
        match task {
            ServingTask::Movement => self.movement = Some(artifact_id),
            ServingTask::Sentiment => self.sentiment = Some(artifact_id),
        }
    }

    /// Inserts or replaces the artifact serving `topic`.
    pub fn upsert_relevance(&mut self, topic: TopicKey, artifact_id: impl Into<String>) {
        let artifact_id = artifact_id.into();
        info!("Routing relevance topic \"{}\" to {}", topic, artifact_id);
        self.relevance.insert(topic, artifact_id);
    }

    /// Every artifact id the manifest references.
    pub fn artifact_ids(&self) -> Vec<&str> {
        self.movement
            .iter()
            .chain(self.sentiment.iter())
            .chain(self.relevance.values())
            .map(String::as_str)
            .collect()
    }
}
