mod common;

use common::{article, movement_articles};
use stockpulse::domain::dataset::{Dataset, TaskKind, derive_movement_labels};
use stockpulse::domain::errors::PipelineError;

#[test]
fn test_labels_follow_next_close() {
    let labels = derive_movement_labels(&[10.0, 12.0, 12.0, 9.0, 11.0]);
    assert_eq!(labels, vec![1, 0, 0, 1]);
}

#[test]
fn test_flat_next_close_is_down() {
    assert_eq!(derive_movement_labels(&[5.0, 5.0]), vec![0]);
    assert!(derive_movement_labels(&[5.0]).is_empty());
}

#[test]
fn test_dataset_sorts_by_date_before_labeling() {
    let articles = vec![
        article("2023-01-03", "second day", 11.0, 12.0),
        article("2023-01-04", "third day", 12.5, 11.0),
        article("2023-01-02", "first day", 9.0, 10.0),
    ];

    let dataset = Dataset::from_articles(articles, 100).expect("Failed to build dataset");
    let texts: Vec<&str> = dataset.records().iter().map(|r| r.text.as_str()).collect();
    let targets: Vec<f64> = dataset.records().iter().map(|r| r.target).collect();

    assert_eq!(dataset.task(), TaskKind::Classification);
    assert_eq!(texts, vec!["first day", "second day"]);
    assert_eq!(targets, vec![1.0, 0.0]);
}

#[test]
fn test_filtered_rows_do_not_break_the_close_chain() {
    // Unchanged-price and blank rows are dropped before labels are derived,
    // so labels compare adjacent surviving closes.
    let articles = vec![
        article("2023-01-02", "opening note", 9.5, 10.0),
        article("2023-01-03", "halted session", 14.0, 14.0),
        article("2023-01-04", "   ", 13.0, 15.0),
        article("2023-01-05", "rally extends", 11.5, 12.0),
        article("2023-01-06", "profit taking", 11.5, 11.0),
    ];

    let dataset = Dataset::from_articles(articles, 100).expect("Failed to build dataset");
    let surviving_closes = [10.0, 12.0, 11.0];
    let expected: Vec<f64> = derive_movement_labels(&surviving_closes)
        .into_iter()
        .map(f64::from)
        .collect();
    let targets: Vec<f64> = dataset.records().iter().map(|r| r.target).collect();

    assert_eq!(targets, expected);
    assert_eq!(targets, vec![1.0, 0.0]);
}

#[test]
fn test_duplicates_removed_and_rows_capped() {
    let mut articles = movement_articles(10);
    articles.push(articles[2].clone());

    let capped = Dataset::from_articles(articles.clone(), 5).expect("Failed to build dataset");
    assert_eq!(capped.len(), 4);

    let full = Dataset::from_articles(articles, 100).expect("Failed to build dataset");
    assert_eq!(full.len(), 9);
}

#[test]
fn test_single_usable_row_is_rejected() {
    let result = Dataset::from_articles(vec![article("2023-01-02", "alone", 1.0, 2.0)], 100);
    assert!(matches!(result, Err(PipelineError::DataIntegrity(_))));
}
