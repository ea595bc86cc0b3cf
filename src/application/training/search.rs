//! Exhaustive hyperparameter search with k-fold cross-validation.
//!
//! Every (configuration, fold) pair is an independent unit of work. Units
//! run on a rayon pool, read shared fold data and never write shared state;
//! scores are only combined after all units finish.

use crate::domain::dataset::TaskKind;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::metrics::Scoring;
use crate::domain::ml::params::{ParamGrid, ParamSet};
use crate::domain::ports::{EstimatorFamily, Predictor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const DEFAULT_K_FOLDS: usize = 3;

/// How cross-validation units are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// Global rayon pool, one worker per core.
    #[default]
    AllCores,
    /// Dedicated pool with a fixed number of workers.
    Threads(usize),
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub k_folds: usize,
    pub scoring: Scoring,
    pub parallelism: Parallelism,
}

impl SearchConfig {
    /// Accuracy for classifiers, negated MSE for regressors.
    pub fn for_task(task: TaskKind) -> Self {
        let scoring = match task {
            TaskKind::Classification => Scoring::Accuracy,
            TaskKind::Regression => Scoring::NegMeanSquaredError,
        };
        Self {
            k_folds: DEFAULT_K_FOLDS,
            scoring,
            parallelism: Parallelism::AllCores,
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_k_folds(mut self, k_folds: usize) -> Self {
        self.k_folds = k_folds;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Scored { mean_score: f64, fold_scores: Vec<f64> },
    Failed { reason: String },
}

/// Cross-validation result for one configuration of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub outcome: CandidateOutcome,
}

impl CandidateScore {
    pub fn mean_score(&self) -> Option<f64> {
        match &self.outcome {
            CandidateOutcome::Scored { mean_score, .. } => Some(*mean_score),
            CandidateOutcome::Failed { .. } => None,
        }
    }

    pub fn is_viable(&self) -> bool {
        self.mean_score().is_some()
    }
}

pub struct SearchOutcome<M> {
    /// Refit on the entire training split.
    pub best_model: M,
    pub best_params: ParamSet,
    /// Mean cross-validation score of `best_params`.
    pub best_score: f64,
    /// Every configuration, in grid order.
    pub candidates: Vec<CandidateScore>,
}

impl<M> SearchOutcome<M> {
    pub fn failed_count(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_viable()).count()
    }
}

/// Held-out fold index for every sample.
///
/// Classification folds are stratified: samples of each class are dealt
/// round-robin, continuing the rotation from the previous class so fold
/// sizes stay within one of each other. Regression folds are contiguous
/// blocks; the first `n % k` blocks hold one extra sample.
pub fn fold_assignments(y: &[f64], task: TaskKind, k: usize) -> PipelineResult<Vec<usize>> {
    let n = y.len();
    if k < 2 || k > n {
        return Err(PipelineError::DataIntegrity(format!(
            "cannot build {} folds over {} samples (need 2 <= k <= n)",
            k, n
        )));
    }

    let mut folds = vec![0usize; n];
    match task {
        TaskKind::Classification => {
            let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
            for (i, label) in y.iter().enumerate() {
                by_class.entry(label.round() as i64).or_default().push(i);
            }
            let mut dealt = 0usize;
            for indices in by_class.values() {
                for &i in indices {
                    folds[i] = dealt % k;
                    dealt += 1;
                }
            }
        }
        TaskKind::Regression => {
            let base = n / k;
            let extra = n % k;
            let mut start = 0;
            for fold in 0..k {
                let size = base + usize::from(fold < extra);
                for slot in folds.iter_mut().skip(start).take(size) {
                    *slot = fold;
                }
                start += size;
            }
        }
    }
    Ok(folds)
}

struct Fold {
    x_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
    x_test: Vec<Vec<f64>>,
    y_test: Vec<f64>,
}

fn build_folds(x: &[Vec<f64>], y: &[f64], assignments: &[usize], k: usize) -> Vec<Fold> {
    (0..k)
        .map(|fold| {
            let mut built = Fold {
                x_train: Vec::new(),
                y_train: Vec::new(),
                x_test: Vec::new(),
                y_test: Vec::new(),
            };
            for (i, &assigned) in assignments.iter().enumerate() {
                if assigned == fold {
                    built.x_test.push(x[i].clone());
                    built.y_test.push(y[i]);
                } else {
                    built.x_train.push(x[i].clone());
                    built.y_train.push(y[i]);
                }
            }
            built
        })
        .collect()
}

fn score_unit<F: EstimatorFamily>(
    family: &F,
    params: &ParamSet,
    fold: &Fold,
    scoring: Scoring,
) -> Result<f64, String> {
    let model = family
        .fit(&fold.x_train, &fold.y_train, params)
        .map_err(|e| e.to_string())?;
    let predictions = model.predict(&fold.x_test).map_err(|e| e.to_string())?;
    let score = scoring.score(&fold.y_test, &predictions);
    if score.is_finite() {
        Ok(score)
    } else {
        Err(format!("non-finite {:?} score", scoring))
    }
}

/// Cross-validates every configuration of `grid` and refits the best one on
/// all of `x`/`y`.
///
/// Failing configurations are recorded and skipped. The best configuration
/// has the highest mean fold score, the earliest in grid order on ties. If
/// its refit fails, the next-ranked viable configuration is refit instead.
pub fn search<F: EstimatorFamily>(
    family: &F,
    grid: &ParamGrid,
    x: &[Vec<f64>],
    y: &[f64],
    config: &SearchConfig,
) -> PipelineResult<SearchOutcome<F::Model>> {
    if x.len() != y.len() {
        return Err(PipelineError::DataIntegrity(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }

    let combinations = grid.combinations()?;
    let k = config.k_folds;
    let assignments = fold_assignments(y, family.task(), k)?;
    let folds = build_folds(x, y, &assignments, k);

    info!(
        "Grid search for {}: {} configurations x {} folds",
        family.name(),
        combinations.len(),
        k
    );

    let units: Vec<(usize, usize)> = (0..combinations.len())
        .flat_map(|c| (0..k).map(move |f| (c, f)))
        .collect();
    let evaluate =
        |&(c, f): &(usize, usize)| score_unit(family, &combinations[c], &folds[f], config.scoring);

    let unit_scores: Vec<Result<f64, String>> = match config.parallelism {
        Parallelism::Sequential => units.iter().map(evaluate).collect(),
        Parallelism::AllCores => units.par_iter().map(evaluate).collect(),
        Parallelism::Threads(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n.max(1))
                .build()
                .map_err(|e| PipelineError::Internal(format!("thread pool: {}", e)))?;
            pool.install(|| units.par_iter().map(evaluate).collect())
        }
    };

    let candidates: Vec<CandidateScore> = combinations
        .into_iter()
        .zip(unit_scores.chunks(k))
        .map(|(params, scores)| {
            let outcome = match scores.iter().find_map(|s| s.as_ref().err()) {
                Some(reason) => {
                    warn!("Skipping {} {}: {}", family.name(), params, reason);
                    CandidateOutcome::Failed {
                        reason: reason.clone(),
                    }
                }
                None => {
                    let fold_scores: Vec<f64> = scores.iter().filter_map(|s| s.clone().ok()).collect();
                    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                    debug!("{} {} -> {:.4}", family.name(), params, mean_score);
                    CandidateOutcome::Scored {
                        mean_score,
                        fold_scores,
                    }
                }
            };
            CandidateScore { params, outcome }
        })
        .collect();

    // Stable sort keeps grid order among equal scores
    let mut ranking: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.mean_score().map(|s| (i, s)))
        .collect();
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (index, score) in ranking {
        let params = &candidates[index].params;
        match family.fit(x, y, params) {
            Ok(model) => {
                info!(
                    "Best {} configuration {} (cv score {:.4})",
                    family.name(),
                    params,
                    score
                );
                return Ok(SearchOutcome {
                    best_model: model,
                    best_params: params.clone(),
                    best_score: score,
                    candidates,
                });
            }
            Err(e) => warn!(
                "Refit of {} {} on the full training split failed: {}",
                family.name(),
                params,
                e
            ),
        }
    }

    Err(PipelineError::NoViableConfiguration {
        family: family.name().to_string(),
        attempted: candidates.len(),
    })
}
