//! CSV adapters for the three training datasets.
//!
//! - movement: the article export (`Date`, `summary`,
//!   `article_price_open_stock`, `article_price_close_stock`, extra columns
//!   ignored)
//! - sentiment: `text,target`
//! - relevance: `text,topic,target`

use crate::domain::dataset::RawArticle;
use crate::domain::errors::PipelineResult;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct TargetRecord {
    text: String,
    target: f64,
}

#[derive(Debug, Deserialize)]
struct TopicTargetRecord {
    text: String,
    topic: String,
    target: f64,
}

fn open(path: &Path) -> PipelineResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(csv::Reader::from_reader(BufReader::new(file)))
}

pub fn read_articles<R: Read>(reader: R) -> PipelineResult<Vec<RawArticle>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut articles = Vec::new();
    for result in rdr.deserialize() {
        articles.push(result?);
    }
    Ok(articles)
}

pub fn load_articles(path: &Path) -> PipelineResult<Vec<RawArticle>> {
    info!("Loading articles from {:?}", path);
    let articles = read_articles(BufReader::new(File::open(path)?))?;
    info!("Loaded {} article rows", articles.len());
    Ok(articles)
}

/// `(text, target)` rows of a sentiment CSV.
pub fn load_targets(path: &Path) -> PipelineResult<Vec<(String, f64)>> {
    info!("Loading regression rows from {:?}", path);
    let mut rows = Vec::new();
    for result in open(path)?.deserialize() {
        let record: TargetRecord = result?;
        rows.push((record.text, record.target));
    }
    Ok(rows)
}

/// `(text, topic, target)` rows of a relevance CSV.
pub fn load_topic_targets(path: &Path) -> PipelineResult<Vec<(String, String, f64)>> {
    info!("Loading relevance rows from {:?}", path);
    let mut rows = Vec::new();
    for result in open(path)?.deserialize() {
        let record: TopicTargetRecord = result?;
        rows.push((record.text, record.topic, record.target));
    }
    Ok(rows)
}
