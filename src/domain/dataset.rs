//! Labeled training data and the train/test split.
//!
//! The dataset provider hands over raw article rows; everything from the
//! date sort to the next-day label lives here so the labeling rule is
//! defined in exactly one place.

use crate::domain::errors::{PipelineError, PipelineResult};
use chrono::{NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of learning task a dataset feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Regression,
}

/// One usable training example.
///
/// Classification targets are exactly `0.0` or `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub text: String,
    pub target: f64,
}

/// A raw article row as exported from the article database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    #[serde(rename = "Date")]
    pub date: String,
    pub summary: Option<String>,
    #[serde(rename = "article_price_open_stock")]
    pub open: f64,
    #[serde(rename = "article_price_close_stock")]
    pub close: f64,
}

/// Default number of leading rows used for movement training.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Next-observation labels for a chronological price series.
///
/// Returns one label per adjacent pair: `1` iff the next value is strictly
/// greater than the current one. The last observation gets no label.
pub fn derive_movement_labels(closes: &[f64]) -> Vec<u8> {
    closes
        .windows(2)
        .map(|pair| u8::from(pair[1] > pair[0]))
        .collect()
}

/// Immutable, ordered set of labeled records for one training session.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<LabeledRecord>,
    task: TaskKind,
}

impl Dataset {
    /// Builds the movement dataset from raw article rows.
    ///
    /// Rows are truncated to `max_rows`, sorted by date (stable), stripped of
    /// blank summaries, unchanged-price rows and exact duplicates, then
    /// labeled from adjacent closes. The final row is dropped because it has
    /// no next close.
    pub fn from_articles(articles: Vec<RawArticle>, max_rows: usize) -> PipelineResult<Self> {
        let mut rows: Vec<RawArticle> = articles.into_iter().take(max_rows).collect();
        rows.sort_by_key(|row| parse_date(&row.date));

        let mut seen = HashSet::new();
        let rows: Vec<(String, f64)> = rows
            .into_iter()
            .filter_map(|row| {
                let summary = row.summary.filter(|s| !s.trim().is_empty())?;
                if row.open == row.close || !row.close.is_finite() {
                    return None;
                }
                if !seen.insert((row.date, summary.clone())) {
                    return None;
                }
                Some((summary, row.close))
            })
            .collect();

        let closes: Vec<f64> = rows.iter().map(|(_, close)| *close).collect();
        let labels = derive_movement_labels(&closes);

        // zip stops at labels.len(), which drops the final unlabeled row
        let records: Vec<LabeledRecord> = rows
            .into_iter()
            .zip(labels)
            .map(|((text, _), label)| LabeledRecord {
                text,
                target: f64::from(label),
            })
            .collect();

        Self::new(records, TaskKind::Classification)
    }

    /// Builds a regression dataset from `(text, target)` pairs.
    ///
    /// Blank texts and non-finite targets are dropped.
    pub fn from_targets(rows: Vec<(String, f64)>) -> PipelineResult<Self> {
        let records = rows
            .into_iter()
            .filter(|(text, target)| !text.trim().is_empty() && target.is_finite())
            .map(|(text, target)| LabeledRecord { text, target })
            .collect();
        Self::new(records, TaskKind::Regression)
    }

    pub fn new(records: Vec<LabeledRecord>, task: TaskKind) -> PipelineResult<Self> {
        if records.is_empty() {
            return Err(PipelineError::DataIntegrity(
                "dataset contains no usable records".to_string(),
            ));
        }
        if task == TaskKind::Classification {
            if let Some(bad) = records.iter().find(|r| r.target != 0.0 && r.target != 1.0) {
                return Err(PipelineError::DataIntegrity(format!(
                    "classification target must be 0 or 1, got {}",
                    bad.target
                )));
            }
        }
        Ok(Self { records, task })
    }

    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Train/test partition shared by every family trained in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<LabeledRecord>,
    pub test: Vec<LabeledRecord>,
}

/// Held-out fraction used when none is configured.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

impl Split {
    /// Single randomized split. The held-out side gets `ceil(n * fraction)`
    /// records; a fixed `seed` makes the split reproducible.
    pub fn random(dataset: &Dataset, test_fraction: f64, seed: Option<u64>) -> PipelineResult<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(PipelineError::DataIntegrity(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }

        let n = dataset.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(PipelineError::DataIntegrity(format!(
                "cannot split {} records with test fraction {}",
                n, test_fraction
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let records = dataset.records();
        let test = indices[..n_test].iter().map(|&i| records[i].clone()).collect();
        let train = indices[n_test..].iter().map(|&i| records[i].clone()).collect();

        Ok(Self { train, test })
    }
}

/// Sort key for the `Date` column. Unparseable dates sort first, keeping
/// their relative order.
fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
