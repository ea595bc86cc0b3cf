pub mod metrics;
pub mod params;
