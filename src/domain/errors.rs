use thiserror::Error;

/// Errors raised by a single estimator while fitting or predicting.
///
/// The search engine treats any of these as a failed configuration rather
/// than a fatal error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimatorError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Fit failed: {0}")]
    FitFailed(String),

    #[error("Prediction failed: {0}")]
    PredictFailed(String),
}

/// Errors of the training and serving pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Cached feature transform `{key}` is unreadable: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("No viable configuration for {family}: all {attempted} candidates failed")]
    NoViableConfiguration { family: String, attempted: usize },

    #[error("Invalid parameter grid: {0}")]
    InvalidGrid(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Model for topic \"{0}\" not found")]
    UnknownTopic(String),

    #[error("No model configured for task \"{0}\"")]
    UnknownTask(String),

    #[error("Invalid request: {0}")]
    RequestValidation(String),

    #[error("Prediction timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the error describes a problem with the caller's request or
    /// routing key, as opposed to a fault inside the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownTopic(_)
                | PipelineError::UnknownTask(_)
                | PipelineError::RequestValidation(_)
                | PipelineError::Timeout { .. }
                | PipelineError::Estimator(_)
                | PipelineError::DataIntegrity(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
