// Feature extraction, estimator families and pipelines
pub mod ml;

// Prediction registry and request-time inference
pub mod serving;

// Grid search, evaluation and reporting
pub mod training;
