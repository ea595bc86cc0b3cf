//! Reporting utilities for training runs.
//!
//! Provides formatted console output and JSON export capabilities.

use crate::application::training::trainer::{EvaluationReport, FamilyOutcome};
use crate::domain::ml::params::ParamGrid;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SummaryEntry<'a> {
    family: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a EvaluationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Reporter for training results output.
pub struct TrainingReporter {
    output_dir: String,
}

impl TrainingReporter {
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }

    /// Prints the search space of one family.
    pub fn print_grid_info(&self, family: &str, grid: &ParamGrid) {
        println!("\n📊 Parameter Grid for {}:", family);
        for name in grid.names() {
            let values: Vec<String> = grid
                .values(name)
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("  {:<20} [{}]", name, values.join(", "));
        }
        println!("\n🔢 Total combinations to test: {}", grid.size());
    }

    /// Prints the held-out evaluation of one family.
    pub fn print_report(&self, report: &EvaluationReport) {
        println!("\n{}", "=".repeat(80));
        println!("✅ {}", report.family);
        println!("{}", "=".repeat(80));
        println!("  Best parameters:  {}", report.best_params);
        println!("  CV score ({:?}): {:.4}", report.scoring, report.cv_score);
        println!("  Held-out:         {}", report.metric);
        println!(
            "  Candidates:       {} evaluated, {} failed",
            report.candidates_evaluated, report.candidates_failed
        );
        if let Some(classification) = &report.classification_report {
            println!("\n{}", classification);
        }
        println!("  Artifact:         {}.json", report.artifact_id);
    }

    /// Prints one line per family, successes and failures alike.
    pub fn print_summary(&self, outcomes: &[FamilyOutcome]) {
        println!("\n{}", "=".repeat(80));
        println!("🏁 TRAINING COMPLETE - {} families", outcomes.len());
        println!("{}", "=".repeat(80));
        println!("{:<40} | {:<36}", "Family", "Result");
        println!("{}", "-".repeat(80));

        for outcome in outcomes {
            match &outcome.result {
                Ok(report) => println!("{:<40} | {}", outcome.family, report.metric),
                Err(e) => println!("{:<40} | ❌ {}", outcome.family, e),
            }
        }

        println!("{}\n", "=".repeat(80));
    }

    /// Exports all outcomes to a JSON file.
    pub fn export_json(&self, outcomes: &[FamilyOutcome], filename: &str) -> Result<()> {
        let output_path = if filename.contains('/') || filename.contains('\\') {
            filename.to_string()
        } else {
            format!("{}/{}", self.output_dir, filename)
        };

        if let Some(parent) = Path::new(&output_path).parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let entries: Vec<SummaryEntry> = outcomes
            .iter()
            .map(|outcome| SummaryEntry {
                family: &outcome.family,
                report: outcome.result.as_ref().ok(),
                error: outcome.result.as_ref().err().map(ToString::to_string),
            })
            .collect();

        let json_output =
            serde_json::to_string_pretty(&entries).context("Failed to serialize results to JSON")?;

        std::fs::write(&output_path, json_output)
            .context(format!("Failed to write results to {}", output_path))?;

        println!("💾 Results saved to: {}", output_path);
        Ok(())
    }
}
