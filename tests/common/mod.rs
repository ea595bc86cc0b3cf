#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use stockpulse::application::ml::families::ModelFamily;
use stockpulse::application::training::search::Parallelism;
use stockpulse::application::training::session::SessionConfig;
use stockpulse::application::training::trainer::TrainingContext;
use stockpulse::domain::dataset::RawArticle;
use stockpulse::domain::ml::params::{ParamGrid, ParamValue};
use stockpulse::domain::ports::BlobStore;
use stockpulse::infrastructure::{ArtifactStore, InMemoryBlobStore};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn scratch_dir(label: &str) -> PathBuf {
    let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "stockpulse_it_{}_{}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
        unique_id,
        label
    ))
}

pub fn article(date: &str, summary: &str, open: f64, close: f64) -> RawArticle {
    RawArticle {
        date: date.to_string(),
        summary: Some(summary.to_string()),
        open,
        close,
    }
}

/// Daily articles whose wording predicts the next close.
pub fn movement_articles(n: usize) -> Vec<RawArticle> {
    let mut close = 100.0;
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let rises = i % 3 != 0;
            let summary = if rises {
                format!("strong demand lifts quarterly outlook story{}", i)
            } else {
                format!("weak sales drag quarterly outlook story{}", i)
            };
            let date = start + chrono::Duration::days(i as i64);
            let row = article(&date.format("%Y-%m-%d").to_string(), &summary, close - 0.5, close);
            close += if rises { 1.0 } else { -1.0 };
            row
        })
        .collect()
}

/// `(text, topic, target)` rows for two topics.
pub fn relevance_rows() -> Vec<(String, String, f64)> {
    let mut rows = Vec::new();
    for i in 0..20 {
        let (text, target) = if i % 2 == 0 {
            (format!("oil output pipeline refinery report{}", i), 0.9)
        } else {
            (format!("celebrity gossip weekend report{}", i), 0.1)
        };
        rows.push((text, "Energy".to_string(), target));

        let (text, target) = if i % 2 == 0 {
            (format!("chip software cloud launch note{}", i), 0.8)
        } else {
            (format!("farm weather harvest note{}", i), 0.2)
        };
        rows.push((text, "Tech".to_string(), target));
    }
    rows
}

pub fn in_memory_context() -> TrainingContext {
    let cache_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    TrainingContext {
        cache_store,
        artifacts: ArtifactStore::new(Arc::new(InMemoryBlobStore::new())),
        session: SessionConfig {
            seed: Some(42),
            ..SessionConfig::default()
        },
        k_folds: 3,
        parallelism: Parallelism::Sequential,
    }
}

pub fn small_classifier_grids() -> Vec<(ModelFamily, ParamGrid)> {
    vec![
        (
            ModelFamily::LogisticRegression,
            ParamGrid::new().with("alpha", [0.1, 1.0]),
        ),
        (
            ModelFamily::RandomForest,
            ParamGrid::new()
                .with("n_trees", [5i64])
                .with("max_depth", [ParamValue::none(), ParamValue::Int(4)]),
        ),
        (
            ModelFamily::GradientBoosting,
            ParamGrid::new()
                .with("n_estimators", [10i64])
                .with("max_depth", [2i64]),
        ),
        (
            ModelFamily::KNearestNeighbors,
            ParamGrid::new().with("k", [3i64]),
        ),
    ]
}

pub fn small_regressor_grids() -> Vec<(ModelFamily, ParamGrid)> {
    vec![
        (
            ModelFamily::RidgeRegression,
            ParamGrid::new().with("alpha", [0.5, 1.0]),
        ),
        (
            ModelFamily::KNearestNeighborsRegression,
            ParamGrid::new().with("k", [3i64]),
        ),
    ]
}
