mod common;

use common::{
    in_memory_context, movement_articles, relevance_rows, scratch_dir, small_classifier_grids,
    small_regressor_grids,
};
use std::sync::Arc;
use std::time::Duration;
use stockpulse::application::ml::families::{FittedModel, ModelFamily};
use stockpulse::application::ml::feature_cache::MOVEMENT_VECTORIZER_KEY;
use stockpulse::application::ml::pipeline::Pipeline;
use stockpulse::application::ml::vectorizer::{TfidfVectorizer, VectorizerConfig};
use stockpulse::application::serving::manifest::{ServingManifest, ServingTask};
use stockpulse::application::serving::registry::ArtifactRegistry;
use stockpulse::application::serving::service::PredictionService;
use stockpulse::application::training::relevance::{group_by_topic, train_relevance};
use stockpulse::application::training::search::Parallelism;
use stockpulse::application::training::trainer::{TrainingContext, select_best};
use stockpulse::domain::dataset::{Dataset, TaskKind};
use stockpulse::domain::errors::PipelineError;
use stockpulse::domain::ml::metrics::Metric;
use stockpulse::domain::ml::params::{ParamGrid, ParamSet};
use stockpulse::domain::ports::{BlobStore, EstimatorFamily};
use stockpulse::domain::topic::TopicKey;
use stockpulse::infrastructure::{ArtifactStore, FsBlobStore, InMemoryBlobStore};

fn accuracy_of(metric: &Metric) -> f64 {
    match metric {
        Metric::Accuracy { accuracy } => *accuracy,
        Metric::Regression { .. } => panic!("expected a classification metric"),
    }
}

fn movement_dataset() -> Dataset {
    Dataset::from_articles(movement_articles(45), 10_000).expect("Failed to build movement dataset")
}

#[test]
fn test_movement_run_trains_and_persists_each_family() {
    let ctx = in_memory_context();
    let grids = small_classifier_grids();

    let outcomes = ctx
        .run(movement_dataset(), MOVEMENT_VECTORIZER_KEY, &grids, None)
        .expect("Failed to prepare training session");

    assert_eq!(outcomes.len(), grids.len());
    let stored = ctx.artifacts.list().expect("Failed to list artifacts");
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        assert_eq!(report.task, TaskKind::Classification);
        assert!((0.0..=1.0).contains(&accuracy_of(&report.metric)));
        assert!(report.classification_report.is_some());
        assert!(stored.contains(&report.artifact_id), "{} not stored", report.artifact_id);
    }

    let best = select_best(&outcomes).expect("No family trained");
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        assert!(accuracy_of(&best.metric) >= accuracy_of(&report.metric));
    }
}

fn fitted_pipeline(family: ModelFamily, params: ParamSet) -> (Pipeline<FittedModel>, Vec<String>) {
    let dataset = movement_dataset();
    let texts: Vec<String> = dataset.records().iter().map(|r| r.text.clone()).collect();
    let targets: Vec<f64> = dataset.records().iter().map(|r| r.target).collect();

    let transform = TfidfVectorizer::fit(&texts, &VectorizerConfig::default())
        .expect("Failed to fit vectorizer");
    let x = transform.transform_batch(&texts);
    let model = family.fit(&x, &targets, &params).expect("Failed to fit model");
    (Pipeline::new(transform, model), texts)
}

fn prediction_bits(pipeline: &Pipeline<FittedModel>, texts: &[String]) -> Vec<u64> {
    pipeline
        .predict(texts)
        .expect("Prediction failed")
        .iter()
        .map(|v| v.to_bits())
        .collect()
}

#[test]
fn test_saved_forest_predicts_like_the_fitted_one() {
    let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
    let (pipeline, texts) = fitted_pipeline(
        ModelFamily::RandomForest,
        ParamSet::new().with("n_trees", 10i64),
    );

    let id = store
        .save(&pipeline, "rf", &Metric::Accuracy { accuracy: 0.734 })
        .expect("Failed to save artifact");
    assert_eq!(id, "rf_accuracy_0.73");

    let loaded = store.load::<FittedModel>(&id).expect("Failed to load artifact");
    assert_eq!(loaded.pipeline.transform, pipeline.transform);
    assert_eq!(prediction_bits(&loaded.pipeline, &texts), prediction_bits(&pipeline, &texts));

    // Saving the reloaded pipeline reproduces the stored bytes.
    let original = store.read_bytes(&id).expect("Failed to read artifact");
    store
        .save(&loaded.pipeline, &loaded.family, &loaded.metric)
        .expect("Failed to save artifact");
    assert_eq!(store.read_bytes(&id).expect("Failed to read artifact"), original);
}

#[test]
fn test_saved_ridge_predicts_like_the_fitted_one() {
    let store = ArtifactStore::new(Arc::new(InMemoryBlobStore::new()));
    let (pipeline, mut texts) = fitted_pipeline(
        ModelFamily::RidgeRegression,
        ParamSet::new().with("alpha", 0.5),
    );
    texts.push("words the model never saw".to_string());

    let id = store
        .save(&pipeline, "ridge", &Metric::Regression { mse: 0.0412, r2: 0.5 })
        .expect("Failed to save artifact");
    assert_eq!(id, "ridge_mse_0.04_r2_0.50");

    let loaded = store.load::<FittedModel>(&id).expect("Failed to load artifact");
    assert_eq!(prediction_bits(&loaded.pipeline, &texts), prediction_bits(&pipeline, &texts));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let grids = vec![(
        ModelFamily::KNearestNeighbors,
        ParamGrid::new().with("k", [1i64, 3, 5]),
    )];

    let sequential = in_memory_context();
    let parallel = TrainingContext {
        parallelism: Parallelism::Threads(3),
        ..in_memory_context()
    };

    let a = sequential
        .run(movement_dataset(), MOVEMENT_VECTORIZER_KEY, &grids, None)
        .expect("Failed to run sequential search");
    let b = parallel
        .run(movement_dataset(), MOVEMENT_VECTORIZER_KEY, &grids, None)
        .expect("Failed to run parallel search");

    let a = a[0].result.as_ref().expect("Sequential search failed");
    let b = b[0].result.as_ref().expect("Parallel search failed");
    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.cv_score.to_bits(), b.cv_score.to_bits());
    assert_eq!(a.artifact_id, b.artifact_id);
}

#[test]
fn test_relevance_models_route_by_topic() {
    let root = scratch_dir("relevance");
    let blobs: Arc<dyn BlobStore> =
        Arc::new(FsBlobStore::open(root.join("models")).expect("Failed to open artifact dir"));
    let ctx = TrainingContext {
        cache_store: Arc::new(
            FsBlobStore::open(root.join("cache")).expect("Failed to open cache dir"),
        ),
        artifacts: ArtifactStore::new(blobs),
        ..in_memory_context()
    };

    let mut manifest = ServingManifest::default();
    let runs = train_relevance(
        &ctx,
        group_by_topic(relevance_rows()),
        &small_regressor_grids(),
        &mut manifest,
    );
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.promoted.is_some()));
    assert!(
        manifest
            .relevance
            .get(&TopicKey::new("energy"))
            .is_some_and(|id| id.starts_with("energy_"))
    );

    let manifest_path = root.join("serving.toml");
    manifest.save(&manifest_path).expect("Failed to save manifest");
    let manifest = ServingManifest::load(&manifest_path).expect("Failed to reload manifest");

    let registry: ArtifactRegistry<FittedModel> =
        ArtifactRegistry::load(&manifest, &ctx.artifacts).expect("Failed to load registry");
    assert_eq!(registry.topics().len(), 2);

    let service = PredictionService::new(Arc::new(registry), Duration::from_secs(5));

    let relevance = tokio_test::block_on(
        service.predict_relevance("oil refinery output".to_string(), " ENERGY "),
    )
    .expect("Relevance prediction failed");
    assert!(relevance.is_finite());

    let missing = tokio_test::block_on(service.predict_relevance("anything".to_string(), "sports"));
    assert!(matches!(missing, Err(PipelineError::UnknownTopic(t)) if t == "sports"));

    let untrained = tokio_test::block_on(service.predict_movement("anything".to_string()));
    assert!(matches!(untrained, Err(PipelineError::UnknownTask(_))));

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_promoted_movement_model_is_served() {
    let ctx = in_memory_context();
    let outcomes = ctx
        .run(
            movement_dataset(),
            MOVEMENT_VECTORIZER_KEY,
            &small_classifier_grids(),
            None,
        )
        .expect("Failed to prepare training session");
    let best = select_best(&outcomes).expect("No family trained");

    let mut manifest = ServingManifest::default();
    manifest.promote(ServingTask::Movement, best.artifact_id.clone());
    assert_eq!(
        manifest.artifact_for(ServingTask::Movement),
        Some(best.artifact_id.as_str())
    );

    let registry: ArtifactRegistry<FittedModel> =
        ArtifactRegistry::load(&manifest, &ctx.artifacts).expect("Failed to load registry");
    let service = PredictionService::new(Arc::new(registry), Duration::from_secs(5));

    let movement = tokio_test::block_on(
        service.predict_movement("strong demand lifts quarterly outlook".to_string()),
    )
    .expect("Movement prediction failed");
    assert!(["up", "down"].contains(&movement.as_str()));
}

#[test]
fn test_manifest_with_missing_artifact_fails_to_load() {
    let ctx = in_memory_context();
    let mut manifest = ServingManifest::default();
    manifest.promote(ServingTask::Sentiment, "ridge_regression_mse_0.10");

    let result: Result<ArtifactRegistry<FittedModel>, _> =
        ArtifactRegistry::load(&manifest, &ctx.artifacts);
    assert!(matches!(result, Err(PipelineError::ArtifactNotFound(_))));
}

#[test]
fn test_topics_with_similar_names_keep_separate_models() {
    let ctx = in_memory_context();
    let mut rows = Vec::new();
    for i in 0..12 {
        let target = if i % 2 == 0 { 0.9 } else { 0.1 };
        rows.push((
            format!("merger takeover bid acquisition note{}", i),
            "m a".to_string(),
            target,
        ));
        rows.push((
            format!("oil refinery pipeline output note{}", i),
            "M&A".to_string(),
            target,
        ));
    }
    let grids = vec![(
        ModelFamily::KNearestNeighborsRegression,
        ParamGrid::new().with("k", [3i64]),
    )];

    let mut manifest = ServingManifest::default();
    let runs = train_relevance(&ctx, group_by_topic(rows), &grids, &mut manifest);
    assert_eq!(runs.len(), 2);

    let spaced = manifest
        .relevance
        .get(&TopicKey::new("m a"))
        .expect("No model routed for \"m a\"")
        .clone();
    let ampersand = manifest
        .relevance
        .get(&TopicKey::new("m&a"))
        .expect("No model routed for \"m&a\"")
        .clone();
    assert_ne!(spaced, ampersand);
    assert_eq!(ctx.artifacts.list().expect("Failed to list artifacts").len(), 2);

    let spaced = ctx.artifacts.load::<FittedModel>(&spaced).expect("Failed to load artifact");
    let ampersand = ctx
        .artifacts
        .load::<FittedModel>(&ampersand)
        .expect("Failed to load artifact");
    let spaced_vocab = spaced.pipeline.transform.vocabulary();
    let ampersand_vocab = ampersand.pipeline.transform.vocabulary();
    assert!(spaced_vocab.contains_key("merger") && !spaced_vocab.contains_key("oil"));
    assert!(ampersand_vocab.contains_key("oil") && !ampersand_vocab.contains_key("merger"));
}

#[test]
fn test_classifier_routed_to_sentiment_fails_to_load() {
    let ctx = in_memory_context();
    let grids = vec![(
        ModelFamily::KNearestNeighbors,
        ParamGrid::new().with("k", [3i64]),
    )];
    let outcomes = ctx
        .run(movement_dataset(), MOVEMENT_VECTORIZER_KEY, &grids, None)
        .expect("Failed to prepare training session");
    let classifier = select_best(&outcomes).expect("No family trained");

    let mut manifest = ServingManifest::default();
    manifest.promote(ServingTask::Sentiment, classifier.artifact_id.clone());

    let result: Result<ArtifactRegistry<FittedModel>, _> =
        ArtifactRegistry::load(&manifest, &ctx.artifacts);
    assert!(matches!(result, Err(PipelineError::Config(_))));
}
