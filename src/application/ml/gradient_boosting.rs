//! Binary gradient boosting over smartcore regression trees.
//!
//! Log-loss boosting: start from the prior log-odds, then repeatedly fit a
//! depth-limited regression tree to the residuals `y - sigmoid(F)` and add
//! it to `F` scaled by the learning rate.

use crate::domain::errors::EstimatorError;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct BoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl BoostedTrees {
    pub fn fit(x: &DenseMatrix<f64>, y: &[f64], params: &BoostingParams) -> Result<Self, EstimatorError> {
        if y.is_empty() {
            return Err(EstimatorError::FitFailed("no training rows".to_string()));
        }
        if !(params.learning_rate > 0.0) {
            return Err(EstimatorError::InvalidParameter {
                name: "learning_rate".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let positives = y.iter().filter(|&&v| v > 0.5).count() as f64;
        let prior = (positives / y.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut tree_params =
            DecisionTreeRegressorParameters::default().with_min_samples_split(params.min_samples_split);
        if let Some(depth) = params.max_depth {
            tree_params = tree_params.with_max_depth(depth as _);
        }

        let mut raw = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&raw)
                .map(|(target, score)| target - sigmoid(*score))
                .collect();
            let tree = DecisionTreeRegressor::fit(x, &residuals, tree_params.clone())
                .map_err(|e| EstimatorError::FitFailed(format!("boosting stage: {}", e)))?;
            let update: Vec<f64> = tree
                .predict(x)
                .map_err(|e| EstimatorError::FitFailed(format!("boosting stage: {}", e)))?;
            for (score, delta) in raw.iter_mut().zip(update) {
                *score += params.learning_rate * delta;
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Class labels (`0.0`/`1.0`).
    pub fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, EstimatorError> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|score| if sigmoid(score) > 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    fn decision_function(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, EstimatorError> {
        let n_rows = x.shape().0;
        let mut raw = vec![self.base_score; n_rows];
        for tree in &self.trees {
            let update = tree
                .predict(x)
                .map_err(|e| EstimatorError::PredictFailed(e.to_string()))?;
            for (score, delta) in raw.iter_mut().zip(update) {
                *score += self.learning_rate * delta;
            }
        }
        Ok(raw)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
