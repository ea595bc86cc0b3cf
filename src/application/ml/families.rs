//! Built-in estimator families backed by smartcore.
//!
//! Every built-in family produces a [`FittedModel`], so artifacts of any
//! built-in family load into the same registry type.

use crate::application::ml::gradient_boosting::{BoostedTrees, BoostingParams};
use crate::domain::dataset::TaskKind;
use crate::domain::errors::EstimatorError;
use crate::domain::ml::params::{ParamGrid, ParamSet, ParamValue};
use crate::domain::ports::{EstimatorFamily, Predictor};
use serde::{Deserialize, Serialize};
use smartcore::algorithm::neighbour::KNNAlgorithmName;
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};
use smartcore::metrics::distance::euclidian::Euclidian;
use smartcore::neighbors::KNNWeightFunction;
use smartcore::neighbors::knn_classifier::{KNNClassifier, KNNClassifierParameters};
use smartcore::neighbors::knn_regressor::{KNNRegressor, KNNRegressorParameters};
use std::fmt;
use std::str::FromStr;

type Matrix = DenseMatrix<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
    KNearestNeighbors,
    RandomForestRegression,
    RidgeRegression,
    KNearestNeighborsRegression,
}

impl ModelFamily {
    /// Families trained for the movement task, in training order.
    pub fn classifiers() -> Vec<ModelFamily> {
        vec![
            ModelFamily::LogisticRegression,
            ModelFamily::RandomForest,
            ModelFamily::GradientBoosting,
            ModelFamily::KNearestNeighbors,
        ]
    }

    /// Families trained for sentiment and relevance.
    pub fn regressors() -> Vec<ModelFamily> {
        vec![
            ModelFamily::RandomForestRegression,
            ModelFamily::RidgeRegression,
            ModelFamily::KNearestNeighborsRegression,
        ]
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::KNearestNeighbors => "k_nearest_neighbors",
            ModelFamily::RandomForestRegression => "random_forest_regression",
            ModelFamily::RidgeRegression => "ridge_regression",
            ModelFamily::KNearestNeighborsRegression => "k_nearest_neighbors_regression",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::KNearestNeighbors => "K-Nearest Neighbors",
            ModelFamily::RandomForestRegression => "Random Forest Regression",
            ModelFamily::RidgeRegression => "Ridge Regression",
            ModelFamily::KNearestNeighborsRegression => "K-Nearest Neighbors Regression",
        }
    }

    /// Default search space for the family.
    pub fn default_grid(&self) -> ParamGrid {
        match self {
            ModelFamily::LogisticRegression => ParamGrid::new().with("alpha", [0.5, 1.0, 2.0, 4.0]),
            ModelFamily::RandomForest => ParamGrid::new()
                .with("n_trees", [100i64, 200])
                .with("max_depth", [ParamValue::none(), ParamValue::Int(40), ParamValue::Int(60)])
                .with("min_samples_split", [5i64, 10, 20]),
            ModelFamily::GradientBoosting => ParamGrid::new()
                .with("n_estimators", [30i64, 50, 75, 100])
                .with("learning_rate", [0.05, 0.1, 0.15])
                .with(
                    "max_depth",
                    [
                        ParamValue::none(),
                        ParamValue::Int(2),
                        ParamValue::Int(3),
                        ParamValue::Int(4),
                    ],
                ),
            ModelFamily::KNearestNeighbors => ParamGrid::new()
                .with("k", [5i64, 10, 15])
                .with("algorithm", ["linear_search", "cover_tree"])
                .with("weight", ["uniform", "distance"]),
            ModelFamily::RandomForestRegression => ParamGrid::new()
                .with("n_trees", [100i64, 200])
                .with("max_depth", [ParamValue::none(), ParamValue::Int(20), ParamValue::Int(40)])
                .with("min_samples_split", [5i64, 10]),
            ModelFamily::RidgeRegression => ParamGrid::new().with("alpha", [0.1, 1.0, 10.0]),
            ModelFamily::KNearestNeighborsRegression => ParamGrid::new()
                .with("k", [5i64, 10, 15])
                .with("weight", ["uniform", "distance"]),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ModelFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "logistic_regression" | "logreg" => Ok(ModelFamily::LogisticRegression),
            "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            "gradient_boosting" | "gb" => Ok(ModelFamily::GradientBoosting),
            "k_nearest_neighbors" | "knn" => Ok(ModelFamily::KNearestNeighbors),
            "random_forest_regression" => Ok(ModelFamily::RandomForestRegression),
            "ridge_regression" | "ridge" => Ok(ModelFamily::RidgeRegression),
            "k_nearest_neighbors_regression" | "knn_regression" => {
                Ok(ModelFamily::KNearestNeighborsRegression)
            }
            _ => anyhow::bail!("Unknown model family: {}", s),
        }
    }
}

/// A fitted model of any built-in family.
#[derive(Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    LogisticRegression(LogisticRegression<f64, i32, Matrix, Vec<i32>>),
    RandomForest(RandomForestClassifier<f64, i32, Matrix, Vec<i32>>),
    GradientBoosting(BoostedTrees),
    KNearestNeighbors(KNNClassifier<f64, i32, Matrix, Vec<i32>, Euclidian<f64>>),
    RandomForestRegression(RandomForestRegressor<f64, f64, Matrix, Vec<f64>>),
    RidgeRegression(RidgeRegression<f64, f64, Matrix, Vec<f64>>),
    KNearestNeighborsRegression(KNNRegressor<f64, f64, Matrix, Vec<f64>, Euclidian<f64>>),
}

fn to_matrix(x: &[Vec<f64>]) -> Result<Matrix, String> {
    DenseMatrix::from_2d_vec(&x.to_vec()).map_err(|e| format!("Matrix error: {}", e))
}

fn to_labels(y: &[f64]) -> Vec<i32> {
    y.iter().map(|v| v.round() as i32).collect()
}

fn from_labels(labels: Vec<i32>) -> Vec<f64> {
    labels.into_iter().map(f64::from).collect()
}

fn fit_failed(e: impl fmt::Display) -> EstimatorError {
    EstimatorError::FitFailed(e.to_string())
}

fn predict_failed(e: impl fmt::Display) -> EstimatorError {
    EstimatorError::PredictFailed(e.to_string())
}

fn knn_algorithm(params: &ParamSet) -> Result<KNNAlgorithmName, EstimatorError> {
    match params.text_or("algorithm", "linear_search")? {
        "linear_search" | "brute" | "auto" => Ok(KNNAlgorithmName::LinearSearch),
        "cover_tree" => Ok(KNNAlgorithmName::CoverTree),
        other => Err(EstimatorError::InvalidParameter {
            name: "algorithm".to_string(),
            reason: format!("unknown neighbour search '{}'", other),
        }),
    }
}

fn knn_weight(params: &ParamSet) -> Result<KNNWeightFunction, EstimatorError> {
    match params.text_or("weight", "uniform")? {
        "uniform" => Ok(KNNWeightFunction::Uniform),
        "distance" => Ok(KNNWeightFunction::Distance),
        other => Err(EstimatorError::InvalidParameter {
            name: "weight".to_string(),
            reason: format!("unknown weight function '{}'", other),
        }),
    }
}

impl EstimatorFamily for ModelFamily {
    type Model = FittedModel;

    fn name(&self) -> &str {
        self.slug()
    }

    fn task(&self) -> TaskKind {
        match self {
            ModelFamily::LogisticRegression
            | ModelFamily::RandomForest
            | ModelFamily::GradientBoosting
            | ModelFamily::KNearestNeighbors => TaskKind::Classification,
            ModelFamily::RandomForestRegression
            | ModelFamily::RidgeRegression
            | ModelFamily::KNearestNeighborsRegression => TaskKind::Regression,
        }
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], params: &ParamSet) -> Result<FittedModel, EstimatorError> {
        let matrix = to_matrix(x).map_err(EstimatorError::FitFailed)?;

        match self {
            ModelFamily::LogisticRegression => {
                params.ensure_known(&["alpha"])?;
                let parameters =
                    LogisticRegressionParameters::default().with_alpha(params.f64_or("alpha", 0.0)?);
                LogisticRegression::fit(&matrix, &to_labels(y), parameters)
                    .map(FittedModel::LogisticRegression)
                    .map_err(fit_failed)
            }
            ModelFamily::RandomForest => {
                params.ensure_known(&["n_trees", "max_depth", "min_samples_split", "min_samples_leaf"])?;
                let mut parameters = RandomForestClassifierParameters::default()
                    .with_n_trees(params.usize_or("n_trees", 100)? as _)
                    .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?);
                if let Some(depth) = params.optional_usize("max_depth")? {
                    parameters = parameters.with_max_depth(depth as _);
                }
                RandomForestClassifier::fit(&matrix, &to_labels(y), parameters)
                    .map(FittedModel::RandomForest)
                    .map_err(fit_failed)
            }
            ModelFamily::GradientBoosting => {
                params.ensure_known(&["n_estimators", "learning_rate", "max_depth", "min_samples_split"])?;
                let defaults = BoostingParams::default();
                let boosting = BoostingParams {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: match params.get("max_depth") {
                        None => defaults.max_depth,
                        Some(_) => params.optional_usize("max_depth")?,
                    },
                    min_samples_split: params.usize_or("min_samples_split", defaults.min_samples_split)?,
                };
                BoostedTrees::fit(&matrix, y, &boosting).map(FittedModel::GradientBoosting)
            }
            ModelFamily::KNearestNeighbors => {
                params.ensure_known(&["k", "algorithm", "weight"])?;
                let parameters = KNNClassifierParameters::default()
                    .with_k(params.usize_or("k", 3)?)
                    .with_algorithm(knn_algorithm(params)?)
                    .with_weight(knn_weight(params)?);
                KNNClassifier::fit(&matrix, &to_labels(y), parameters)
                    .map(FittedModel::KNearestNeighbors)
                    .map_err(fit_failed)
            }
            ModelFamily::RandomForestRegression => {
                params.ensure_known(&["n_trees", "max_depth", "min_samples_split", "min_samples_leaf"])?;
                let mut parameters = RandomForestRegressorParameters::default()
                    .with_n_trees(params.usize_or("n_trees", 100)? as _)
                    .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?);
                if let Some(depth) = params.optional_usize("max_depth")? {
                    parameters = parameters.with_max_depth(depth as _);
                }
                RandomForestRegressor::fit(&matrix, &y.to_vec(), parameters)
                    .map(FittedModel::RandomForestRegression)
                    .map_err(fit_failed)
            }
            ModelFamily::RidgeRegression => {
                params.ensure_known(&["alpha"])?;
                // sparse tf-idf columns are often constant within a fold
                let parameters = RidgeRegressionParameters::default()
                    .with_alpha(params.f64_or("alpha", 1.0)?)
                    .with_normalize(false);
                RidgeRegression::fit(&matrix, &y.to_vec(), parameters)
                    .map(FittedModel::RidgeRegression)
                    .map_err(fit_failed)
            }
            ModelFamily::KNearestNeighborsRegression => {
                params.ensure_known(&["k", "algorithm", "weight"])?;
                let parameters = KNNRegressorParameters::default()
                    .with_k(params.usize_or("k", 3)?)
                    .with_algorithm(knn_algorithm(params)?)
                    .with_weight(knn_weight(params)?);
                KNNRegressor::fit(&matrix, &y.to_vec(), parameters)
                    .map(FittedModel::KNearestNeighborsRegression)
                    .map_err(fit_failed)
            }
        }
    }
}

impl Predictor for FittedModel {
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        let matrix = to_matrix(x).map_err(EstimatorError::PredictFailed)?;

        match self {
            FittedModel::LogisticRegression(model) => {
                model.predict(&matrix).map(from_labels).map_err(predict_failed)
            }
            FittedModel::RandomForest(model) => {
                model.predict(&matrix).map(from_labels).map_err(predict_failed)
            }
            FittedModel::GradientBoosting(model) => model.predict(&matrix),
            FittedModel::KNearestNeighbors(model) => {
                model.predict(&matrix).map(from_labels).map_err(predict_failed)
            }
            FittedModel::RandomForestRegression(model) => model.predict(&matrix).map_err(predict_failed),
            FittedModel::RidgeRegression(model) => model.predict(&matrix).map_err(predict_failed),
            FittedModel::KNearestNeighborsRegression(model) => {
                model.predict(&matrix).map_err(predict_failed)
            }
        }
    }
}
