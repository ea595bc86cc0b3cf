pub mod relevance;
pub mod reporting;
pub mod search;
pub mod session;
pub mod trainer;
