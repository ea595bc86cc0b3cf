//! Parameter grid configuration from TOML.
//!
//! ```toml
//! [[family]]
//! name = "random_forest"
//!
//! [family.grid]
//! n_trees = [450, 500]
//! max_depth = ["none", 40]
//! ```
//!
//! Families listed in the file replace the built-in set for their task;
//! a task with no listed family keeps the built-in families and grids.

use crate::application::ml::families::ModelFamily;
use crate::domain::dataset::TaskKind;
use crate::domain::ml::params::ParamGrid;
use crate::domain::ports::EstimatorFamily;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyGrid {
    pub name: String,
    #[serde(default)]
    pub grid: ParamGrid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub family: Vec<FamilyGrid>,
}

impl GridConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: GridConfig = toml::from_str(content).context("Failed to parse grid config")?;
        for entry in &config.family {
            entry
                .name
                .parse::<ModelFamily>()
                .with_context(|| format!("Invalid grid config entry {:?}", entry.name))?;
            entry
                .grid
                .validate()
                .with_context(|| format!("Invalid grid for {}", entry.name))?;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read grid config {:?}", path))?;
        Self::parse(&content)
    }

    /// Built-in families of `task` with their default grids.
    pub fn defaults_for(task: TaskKind) -> Vec<(ModelFamily, ParamGrid)> {
        let families = match task {
            TaskKind::Classification => ModelFamily::classifiers(),
            TaskKind::Regression => ModelFamily::regressors(),
        };
        families
            .into_iter()
            .map(|family| (family, family.default_grid()))
            .collect()
    }

    /// Families and grids to train for `task`.
    pub fn families_for(&self, task: TaskKind) -> Result<Vec<(ModelFamily, ParamGrid)>> {
        let mut selected = Vec::new();
        for entry in &self.family {
            let family: ModelFamily = entry.name.parse()?;
            if family.task() == task {
                selected.push((family, entry.grid.clone()));
            }
        }
        if selected.is_empty() {
            return Ok(Self::defaults_for(task));
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[family]]
        name = "random_forest"

        [family.grid]
        n_trees = [450, 500]
        max_depth = ["none", 40]

        [[family]]
        name = "logistic_regression"

        [family.grid]
        alpha = [0.5, 1.0]
    "#;

    #[test]
    fn test_listed_families_replace_defaults() {
        let config = GridConfig::parse(SAMPLE).unwrap();
        let classifiers = config.families_for(TaskKind::Classification).unwrap();

        assert_eq!(classifiers.len(), 2);
        assert_eq!(classifiers[0].0, ModelFamily::RandomForest);
        assert_eq!(classifiers[0].1.size(), 4);
    }

    #[test]
    fn test_unlisted_task_keeps_defaults() {
        let config = GridConfig::parse(SAMPLE).unwrap();
        let regressors = config.families_for(TaskKind::Regression).unwrap();
        assert_eq!(regressors.len(), ModelFamily::regressors().len());
    }

    #[test]
    fn test_unknown_family_rejected() {
        assert!(GridConfig::parse("[[family]]\nname = \"svm\"\n").is_err());
        assert!(GridConfig::parse("[[family]]\nname = \"knn\"\n[family.grid]\nk = []\n").is_err());
    }
}
