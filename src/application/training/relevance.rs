//! Per-topic relevance training.
//!
//! Each topic gets its own session, its own cached transform and
//! topic-prefixed artifact names, so topics never overwrite each other. The
//! lowest-MSE artifact of each topic is routed in the serving manifest.

use crate::application::serving::manifest::ServingManifest;
use crate::application::training::trainer::{FamilyOutcome, TrainingContext, select_best};
use crate::domain::dataset::Dataset;
use crate::domain::errors::PipelineResult;
use crate::domain::ml::params::ParamGrid;
use crate::domain::ports::EstimatorFamily;
use crate::domain::topic::TopicKey;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Feature cache key of a topic's transform.
pub fn relevance_cache_key(topic: &TopicKey) -> String {
    format!("relevance_{}_vectorizer.json", topic.slug())
}

/// Groups `(text, topic, target)` rows by normalized topic.
pub fn group_by_topic(rows: Vec<(String, String, f64)>) -> BTreeMap<TopicKey, Vec<(String, f64)>> {
    let mut grouped: BTreeMap<TopicKey, Vec<(String, f64)>> = BTreeMap::new();
    for (text, topic, target) in rows {
        grouped
            .entry(TopicKey::new(&topic))
            .or_default()
            .push((text, target));
    }
    grouped
}

#[derive(Debug)]
pub struct TopicRun {
    pub topic: TopicKey,
    /// `Err` when the topic's session could not be prepared.
    pub outcomes: PipelineResult<Vec<FamilyOutcome>>,
    /// Artifact routed for this topic, if any family succeeded.
    pub promoted: Option<String>,
}

/// Trains every family for every topic and upserts each topic's best
/// artifact into `manifest`. Topics are isolated: one failing topic is
/// logged and the rest still train.
pub fn train_relevance<F: EstimatorFamily>(
    ctx: &TrainingContext,
    rows_by_topic: BTreeMap<TopicKey, Vec<(String, f64)>>,
    families: &[(F, ParamGrid)],
    manifest: &mut ServingManifest,
) -> Vec<TopicRun> {
    let mut runs = Vec::with_capacity(rows_by_topic.len());

    for (topic, rows) in rows_by_topic {
        info!("Training relevance models for topic \"{}\" ({} rows)", topic, rows.len());

        let outcomes = Dataset::from_targets(rows).and_then(|dataset| {
            ctx.run(
                dataset,
                &relevance_cache_key(&topic),
                families,
                Some(&topic.slug()),
            )
        });

        let promoted = match &outcomes {
            Ok(outcomes) => match select_best(outcomes) {
                Some(best) => {
                    manifest.upsert_relevance(topic.clone(), best.artifact_id.clone());
                    Some(best.artifact_id.clone())
                }
                None => {
                    warn!("No relevance model trained for topic \"{}\"", topic);
                    None
                }
            },
            Err(e) => {
                error!("Relevance training for topic \"{}\" failed: {}", topic, e);
                None
            }
        };

        runs.push(TopicRun {
            topic,
            outcomes,
            promoted,
        });
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_uses_slug() {
        assert_eq!(
            relevance_cache_key(&TopicKey::new("Real Estate")),
            "relevance_real_estate_d7efa2f7_vectorizer.json"
        );
    }

    #[test]
    fn test_rows_grouped_by_normalized_topic() {
        let grouped = group_by_topic(vec![
            ("a".to_string(), "Energy".to_string(), 0.1),
            ("b".to_string(), "energy ".to_string(), 0.2),
            ("c".to_string(), "tech".to_string(), 0.3),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&TopicKey::new("energy")].len(), 2);
    }
}
