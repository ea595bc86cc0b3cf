// Labeled records and splits
pub mod dataset;

// Domain-specific error types
pub mod errors;

// Hyperparameters and metrics
pub mod ml;

// Port interfaces
pub mod ports;

pub mod topic;
