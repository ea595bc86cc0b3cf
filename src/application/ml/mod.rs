pub mod families;
pub mod feature_cache;
pub mod gradient_boosting;
pub mod pipeline;
pub mod vectorizer;
