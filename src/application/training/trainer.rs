//! Per-family train / evaluate / persist loop.

use crate::application::ml::feature_cache::FeatureCache;
use crate::application::ml::pipeline::Pipeline;
use crate::application::training::search::{Parallelism, SearchConfig, search};
use crate::application::training::session::{SessionConfig, TrainingSession};
use crate::domain::dataset::{Dataset, TaskKind};
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::metrics::{
    ClassificationReport, Metric, Scoring, accuracy, mean_squared_error, r2_score,
};
use crate::domain::ml::params::{ParamGrid, ParamSet};
use crate::domain::ports::{BlobStore, EstimatorFamily, Predictor};
use crate::infrastructure::artifact_store::ArtifactStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of training one family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Family name as stored, including any topic prefix.
    pub family: String,
    pub task: TaskKind,
    pub best_params: ParamSet,
    pub cv_score: f64,
    pub scoring: Scoring,
    pub metric: Metric,
    pub classification_report: Option<ClassificationReport>,
    pub artifact_id: String,
    pub candidates_evaluated: usize,
    pub candidates_failed: usize,
}

/// Result slot for one family of a multi-family run.
#[derive(Debug)]
pub struct FamilyOutcome {
    pub family: String,
    pub result: PipelineResult<EvaluationReport>,
}

pub struct ModelTrainer<'a> {
    session: &'a TrainingSession,
    store: &'a ArtifactStore,
    search: SearchConfig,
    name_prefix: Option<String>,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(session: &'a TrainingSession, store: &'a ArtifactStore, search: SearchConfig) -> Self {
        Self {
            session,
            store,
            search,
            name_prefix: None,
        }
    }

    /// Prefixes every stored family name, e.g. with a topic slug.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    fn stored_name(&self, family: &str) -> String {
        match &self.name_prefix {
            Some(prefix) => format!("{}_{}", prefix, family),
            None => family.to_string(),
        }
    }

    /// Grid-searches `family` on the train split, scores the winner once on
    /// the test split and persists it.
    pub fn evaluate<F: EstimatorFamily>(&self, family: &F, grid: &ParamGrid) -> PipelineResult<EvaluationReport> {
        let task = self.session.task();
        if family.task() != task {
            return Err(PipelineError::DataIntegrity(format!(
                "{} expects {:?} data but the session holds {:?} data",
                family.name(),
                family.task(),
                task
            )));
        }

        let stored_name = self.stored_name(family.name());
        info!("Training {}...", stored_name);

        let outcome = search(
            family,
            grid,
            self.session.x_train(),
            self.session.y_train(),
            &self.search,
        )?;

        let y_test = self.session.y_test();
        let predictions = outcome.best_model.predict(self.session.x_test())?;

        let (metric, classification_report) = match task {
            TaskKind::Classification => {
                let report = ClassificationReport::compute(y_test, &predictions);
                (
                    Metric::Accuracy {
                        accuracy: accuracy(y_test, &predictions),
                    },
                    Some(report),
                )
            }
            TaskKind::Regression => (
                Metric::Regression {
                    mse: mean_squared_error(y_test, &predictions),
                    r2: r2_score(y_test, &predictions),
                },
                None,
            ),
        };
        info!("{} held-out {}", stored_name, metric);

        let candidates_evaluated = outcome.candidates.len();
        let candidates_failed = outcome.failed_count();
        let pipeline = Pipeline::new(self.session.transform().clone(), outcome.best_model);
        let artifact_id = self.store.save(&pipeline, &stored_name, &metric)?;

        Ok(EvaluationReport {
            family: stored_name,
            task,
            best_params: outcome.best_params,
            cv_score: outcome.best_score,
            scoring: self.search.scoring,
            metric,
            classification_report,
            artifact_id,
            candidates_evaluated,
            candidates_failed,
        })
    }

    /// Trains each family independently. A failing family is logged and
    /// reported in its slot; the remaining families still run.
    pub fn evaluate_all<F: EstimatorFamily>(&self, families: &[(F, ParamGrid)]) -> Vec<FamilyOutcome> {
        families
            .iter()
            .map(|(family, grid)| {
                let result = self.evaluate(family, grid);
                if let Err(e) = &result {
                    error!("Training {} failed: {}", self.stored_name(family.name()), e);
                }
                FamilyOutcome {
                    family: self.stored_name(family.name()),
                    result,
                }
            })
            .collect()
    }
}

/// Stores and settings shared by every training run of one invocation.
#[derive(Clone)]
pub struct TrainingContext {
    /// Backing store for cached feature transforms.
    pub cache_store: Arc<dyn BlobStore>,
    pub artifacts: ArtifactStore,
    pub session: SessionConfig,
    pub k_folds: usize,
    pub parallelism: Parallelism,
}

impl TrainingContext {
    pub fn search_config(&self, task: TaskKind) -> SearchConfig {
        SearchConfig::for_task(task)
            .with_k_folds(self.k_folds)
            .with_parallelism(self.parallelism)
    }

    /// Prepares one session over `dataset` (transform cached under
    /// `cache_key`) and trains every family on it.
    pub fn run<F: EstimatorFamily>(
        &self,
        dataset: Dataset,
        cache_key: &str,
        families: &[(F, ParamGrid)],
        name_prefix: Option<&str>,
    ) -> PipelineResult<Vec<FamilyOutcome>> {
        let task = dataset.task();
        let cache = FeatureCache::new(self.cache_store.clone(), cache_key);
        let session = TrainingSession::prepare(dataset, &self.session, &cache)?;

        let mut trainer = ModelTrainer::new(&session, &self.artifacts, self.search_config(task));
        if let Some(prefix) = name_prefix {
            trainer = trainer.with_name_prefix(prefix);
        }
        Ok(trainer.evaluate_all(families))
    }
}

/// Best successful report of a run: highest accuracy for classifiers,
/// lowest MSE for regressors. The earliest report wins ties.
pub fn select_best(outcomes: &[FamilyOutcome]) -> Option<&EvaluationReport> {
    let mut best: Option<&EvaluationReport> = None;
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        let better = match best {
            None => true,
            Some(current) => match (&report.metric, &current.metric) {
                (Metric::Accuracy { accuracy: a }, Metric::Accuracy { accuracy: b }) => a > b,
                (Metric::Regression { mse: a, .. }, Metric::Regression { mse: b, .. }) => a < b,
                _ => false,
            },
        };
        if better {
            best = Some(report);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::families::ModelFamily;
    use crate::domain::dataset::LabeledRecord;
    use crate::infrastructure::blob_store::InMemoryBlobStore;

    fn classification_session() -> TrainingSession {
        let records = (0..40)
            .map(|i| {
                let (text, target) = if i % 2 == 0 {
                    ("shares surge on record profit growth", 1.0)
                } else {
                    ("shares slump after weak guidance cut", 0.0)
                };
                LabeledRecord {
                    text: format!("{} {}", text, i),
                    target,
                }
            })
            .collect();
        let dataset = Dataset::new(records, TaskKind::Classification).unwrap();
        let cache = FeatureCache::new(Arc::new(InMemoryBlobStore::new()), "t.json");
        let config = SessionConfig {
            seed: Some(5),
            ..SessionConfig::default()
        };
        TrainingSession::prepare(dataset, &config, &cache).unwrap()
    }

    fn search_config() -> SearchConfig {
        SearchConfig::for_task(TaskKind::Classification).with_parallelism(Parallelism::Sequential)
    }

    #[test]
    fn test_evaluate_persists_artifact_with_report() {
        let session = classification_session();
        let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
        let trainer = ModelTrainer::new(&session, &store, search_config());

        let grid = ParamGrid::new().with("alpha", [0.5, 1.0]);
        let report = trainer.evaluate(&ModelFamily::LogisticRegression, &grid).unwrap();

        assert_eq!(report.candidates_evaluated, 2);
        assert!(report.artifact_id.starts_with("logistic_regression_accuracy_"));
        assert!(store.exists(&report.artifact_id).unwrap());
        assert!(report.classification_report.is_some());
    }

    #[test]
    fn test_failing_family_does_not_abort_others() {
        let session = classification_session();
        let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
        let trainer = ModelTrainer::new(&session, &store, search_config());

        let families = vec![
            (
                ModelFamily::KNearestNeighbors,
                ParamGrid::new().with("weight", ["bogus"]),
            ),
            (
                ModelFamily::LogisticRegression,
                ParamGrid::new().with("alpha", [1.0]),
            ),
        ];
        let outcomes = trainer.evaluate_all(&families);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(PipelineError::NoViableConfiguration { .. })
        ));
        assert!(outcomes[1].result.is_ok());
        assert_eq!(select_best(&outcomes).unwrap().family, "logistic_regression");
    }

    #[test]
    fn test_family_task_must_match_session() {
        let session = classification_session();
        let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
        let trainer = ModelTrainer::new(&session, &store, search_config());

        let result = trainer.evaluate(&ModelFamily::RidgeRegression, &ParamGrid::new());
        assert!(matches!(result, Err(PipelineError::DataIntegrity(_))));
    }

    #[test]
    fn test_name_prefix_applies_to_artifact() {
        let session = classification_session();
        let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
        let trainer = ModelTrainer::new(&session, &store, search_config()).with_name_prefix("energy");

        let report = trainer
            .evaluate(&ModelFamily::LogisticRegression, &ParamGrid::new())
            .unwrap();
        assert_eq!(report.family, "energy_logistic_regression");
        assert!(report.artifact_id.starts_with("energy_logistic_regression_"));
    }
}
