//! Offline training for the movement, sentiment and relevance models.
//!
//! # Usage
//! ```sh
//! cargo run --release --bin train -- movement --promote
//! cargo run --release --bin train -- relevance --input data/relevance.csv
//! cargo run --release --bin train -- invalidate-cache movement
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use stockpulse::application::ml::families::ModelFamily;
use stockpulse::application::ml::feature_cache::{
    FeatureCache, MOVEMENT_VECTORIZER_KEY, SENTIMENT_VECTORIZER_KEY,
};
use stockpulse::application::serving::manifest::{ServingManifest, ServingTask};
use stockpulse::application::training::relevance::{
    group_by_topic, relevance_cache_key, train_relevance,
};
use stockpulse::application::training::reporting::TrainingReporter;
use stockpulse::application::training::trainer::{FamilyOutcome, TrainingContext, select_best};
use stockpulse::config::{GridConfig, TrainingEnvConfig};
use stockpulse::domain::dataset::{Dataset, TaskKind};
use stockpulse::domain::ml::params::ParamGrid;
use stockpulse::domain::topic::TopicKey;
use stockpulse::infrastructure::dataset_loader;
use stockpulse::infrastructure::{ArtifactStore, FsBlobStore};
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML parameter grids (overrides GRID_CONFIG)
    #[arg(long, global = true)]
    grid_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train next-day movement classifiers on the article export
    Movement {
        /// Article CSV (overrides MOVEMENT_DATASET_PATH)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Leading rows to use (overrides MAX_ROWS)
        #[arg(long)]
        max_rows: Option<usize>,

        /// Route the best model of this run in the serving manifest
        #[arg(long)]
        promote: bool,
    },
    /// Train sentiment regressors on a `text,target` CSV
    Sentiment {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        promote: bool,
    },
    /// Train one set of relevance regressors per topic on a `text,topic,target` CSV
    Relevance {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Drop a cached feature transform so the next run refits it
    InvalidateCache {
        #[arg(value_enum)]
        target: CacheTarget,

        /// Topic, for relevance transforms
        #[arg(long)]
        topic: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CacheTarget {
    Movement,
    Sentiment,
    Relevance,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let args = Args::parse();
    let config = TrainingEnvConfig::from_env()?;
    info!(
        "Configuration loaded: Artifacts={:?}, Folds={}, Test fraction={}, Seed={:?}",
        config.artifact_dir, config.cv_folds, config.test_fraction, config.split_seed
    );

    let grids = match args.grid_config.as_ref().or(config.grid_config.as_ref()) {
        Some(path) => GridConfig::load(path)?,
        None => GridConfig::default(),
    };

    let cache_store = Arc::new(
        FsBlobStore::open(&config.feature_cache_dir).context("Failed to open feature cache directory")?,
    );
    let ctx = TrainingContext {
        cache_store,
        artifacts: ArtifactStore::new(Arc::new(
            FsBlobStore::open(&config.artifact_dir).context("Failed to open artifact directory")?,
        )),
        session: config.session_config(),
        k_folds: config.cv_folds,
        parallelism: config.parallelism(),
    };
    let reporter = TrainingReporter::new(&config.report_dir.to_string_lossy());

    match args.command {
        Command::Movement {
            input,
            max_rows,
            promote,
        } => {
            let path = input.unwrap_or_else(|| config.movement_dataset.clone());
            let articles = dataset_loader::load_articles(&path)
                .with_context(|| format!("Failed to load articles from {:?}", path))?;
            let dataset = Dataset::from_articles(articles, max_rows.unwrap_or(config.max_rows))?;
            info!("Movement dataset: {} labeled articles", dataset.len());

            let families = grids.families_for(TaskKind::Classification)?;
            let outcomes = run_task(&ctx, &reporter, dataset, MOVEMENT_VECTORIZER_KEY, &families)?;
            reporter.export_json(&outcomes, "movement_summary.json")?;
            if promote {
                promote_best(&config, &outcomes, ServingTask::Movement)?;
            }
        }
        Command::Sentiment { input, promote } => {
            let path = input.unwrap_or_else(|| config.sentiment_dataset.clone());
            let rows = dataset_loader::load_targets(&path)
                .with_context(|| format!("Failed to load sentiment rows from {:?}", path))?;
            let dataset = Dataset::from_targets(rows)?;

            let families = grids.families_for(TaskKind::Regression)?;
            let outcomes = run_task(&ctx, &reporter, dataset, SENTIMENT_VECTORIZER_KEY, &families)?;
            reporter.export_json(&outcomes, "sentiment_summary.json")?;
            if promote {
                promote_best(&config, &outcomes, ServingTask::Sentiment)?;
            }
        }
        Command::Relevance { input } => {
            let path = input.unwrap_or_else(|| config.relevance_dataset.clone());
            let rows = dataset_loader::load_topic_targets(&path)
                .with_context(|| format!("Failed to load relevance rows from {:?}", path))?;
            let by_topic = group_by_topic(rows);
            info!("Relevance dataset: {} topics", by_topic.len());

            let families = grids.families_for(TaskKind::Regression)?;
            for (family, grid) in &families {
                reporter.print_grid_info(family.display_name(), grid);
            }

            let mut manifest = ServingManifest::load_or_default(&config.manifest_path)?;
            let runs = train_relevance(&ctx, by_topic, &families, &mut manifest);

            let mut all_outcomes = Vec::new();
            for run in runs {
                match run.outcomes {
                    Ok(outcomes) => {
                        println!("\n📂 Topic \"{}\"", run.topic);
                        for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
                            reporter.print_report(report);
                        }
                        all_outcomes.extend(outcomes);
                    }
                    Err(e) => warn!("Topic \"{}\" skipped: {}", run.topic, e),
                }
            }
            reporter.print_summary(&all_outcomes);
            reporter.export_json(&all_outcomes, "relevance_summary.json")?;

            if manifest.relevance.is_empty() {
                bail!("No relevance model was trained");
            }
            manifest.save(&config.manifest_path)?;
        }
        Command::InvalidateCache { target, topic } => {
            let key = match (target, topic) {
                (CacheTarget::Movement, _) => MOVEMENT_VECTORIZER_KEY.to_string(),
                (CacheTarget::Sentiment, _) => SENTIMENT_VECTORIZER_KEY.to_string(),
                (CacheTarget::Relevance, Some(topic)) => relevance_cache_key(&TopicKey::new(&topic)),
                (CacheTarget::Relevance, None) => bail!("--topic is required for relevance"),
            };
            let cache = FeatureCache::new(ctx.cache_store.clone(), key);
            if cache.invalidate()? {
                println!("🗑️  Removed cached transform {}", cache.key());
            } else {
                println!("Nothing cached under {}", cache.key());
            }
        }
    }

    Ok(())
}

fn run_task(
    ctx: &TrainingContext,
    reporter: &TrainingReporter,
    dataset: Dataset,
    cache_key: &str,
    families: &[(ModelFamily, ParamGrid)],
) -> Result<Vec<FamilyOutcome>> {
    for (family, grid) in families {
        reporter.print_grid_info(family.display_name(), grid);
    }

    let outcomes = ctx.run(dataset, cache_key, families, None)?;
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        reporter.print_report(report);
    }
    reporter.print_summary(&outcomes);

    if outcomes.iter().all(|o| o.result.is_err()) {
        bail!("Every model family failed to train");
    }
    Ok(outcomes)
}

fn promote_best(config: &TrainingEnvConfig, outcomes: &[FamilyOutcome], task: ServingTask) -> Result<()> {
    let Some(best) = select_best(outcomes) else {
        bail!("No trained model to promote for {}", task);
    };
    let mut manifest = ServingManifest::load_or_default(&config.manifest_path)?;
    manifest.promote(task, best.artifact_id.clone());
    manifest.save(&config.manifest_path)?;
    println!("🏆 {} now served by {}", task, best.artifact_id);
    Ok(())
}
