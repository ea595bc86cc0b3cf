//! Hyperparameter values, configurations and exhaustive grids.

use crate::domain::errors::{EstimatorError, PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single candidate value of a hyperparameter.
///
/// The string `"none"` stands for "unbounded" (e.g. no depth limit), since
/// TOML has no null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn none() -> Self {
        ParamValue::Text("none".to_string())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::Text(s) if s.eq_ignore_ascii_case("none"))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One concrete configuration: parameter name to chosen value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails if the set names a parameter outside `known`.
    pub fn ensure_known(&self, known: &[&str]) -> Result<(), EstimatorError> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(EstimatorError::InvalidParameter {
                name: unknown.clone(),
                reason: format!("unsupported, expected one of {:?}", known),
            }),
            None => Ok(()),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, EstimatorError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(other) => Err(invalid(name, other, "a non-negative integer")),
        }
    }

    /// Integer parameter where `"none"` (or absence) means unbounded.
    pub fn optional_usize(&self, name: &str) -> Result<Option<usize>, EstimatorError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) if v.is_none() => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(Some(*v as usize)),
            Some(other) => Err(invalid(name, other, "a non-negative integer or 'none'")),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, EstimatorError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(invalid(name, other, "a number")),
        }
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, EstimatorError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(invalid(name, other, "a string")),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, EstimatorError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(other) => Err(invalid(name, other, "a boolean")),
        }
    }
}

fn invalid(name: &str, value: &ParamValue, expected: &str) -> EstimatorError {
    EstimatorError::InvalidParameter {
        name: name.to_string(),
        reason: format!("expected {}, got {}", expected, value),
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Discrete search space: parameter name to ordered candidate values.
///
/// Keys iterate in sorted order and the last key varies fastest, so the
/// enumeration order is fully determined by the grid's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.0
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Number of configurations in the Cartesian product.
    pub fn size(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if let Some((name, _)) = self.0.iter().find(|(_, values)| values.is_empty()) {
            return Err(PipelineError::InvalidGrid(format!(
                "parameter `{}` has no candidate values",
                name
            )));
        }
        Ok(())
    }

    /// Every configuration of the grid, in enumeration order.
    ///
    /// An empty grid yields a single empty configuration.
    pub fn combinations(&self) -> PipelineResult<Vec<ParamSet>> {
        self.validate()?;

        let axes: Vec<(&String, &Vec<ParamValue>)> = self.0.iter().collect();
        let mut cursor = vec![0usize; axes.len()];
        let mut combinations = Vec::with_capacity(self.size());

        loop {
            let mut set = ParamSet::new();
            for (axis, &pos) in axes.iter().zip(cursor.iter()) {
                set.0.insert(axis.0.clone(), axis.1[pos].clone());
            }
            combinations.push(set);

            // Odometer increment, last axis first
            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    return Ok(combinations);
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < axes[axis].1.len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }
}
