//! Parameter grid definitions and candidate enumeration.

use gs_types::{GsResult, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A concrete parameter value. Grids mix numbers and strings freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers, and floats with no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(v) => write!(f, "{v}"),
            // whole floats keep a trailing ".0" so they read differently from ints
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// One grid point: parameter name to value, ordered by name.
pub type ParamSet = BTreeMap<String, ParameterValue>;

/// Render a parameter set as a dict literal, e.g. `{'loss': 'log_loss', 'max_depth': 3}`.
pub fn format_params(params: &ParamSet) -> String {
    let body = params
        .iter()
        .map(|(name, value)| format!("'{name}': {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Parameter name to the ordered candidate values tried for it.
///
/// Names are kept sorted. Candidates enumerate the cartesian product over the
/// sorted names with the last name varying fastest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParameterValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    /// Set the candidate values for `name`, replacing any previous entry.
    pub fn add(mut self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    pub fn add_ints(self, name: impl Into<String>, values: &[i64]) -> Self {
        self.add(name, values.iter().map(|v| ParameterValue::Int(*v)).collect())
    }

    pub fn add_floats(self, name: impl Into<String>, values: &[f64]) -> Self {
        self.add(name, values.iter().map(|v| ParameterValue::Float(*v)).collect())
    }

    pub fn add_strs(self, name: impl Into<String>, values: &[&str]) -> Self {
        self.add(name, values.iter().map(|v| ParameterValue::from(*v)).collect())
    }

    /// Evenly spaced floats in `[start, stop)`.
    pub fn add_float_range(
        self,
        name: impl Into<String>,
        start: f64,
        stop: f64,
        step: f64,
    ) -> Self {
        self.add_floats(name, &float_range(start, stop, step))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn values(&self, name: &str) -> Option<&[ParameterValue]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParameterValue])> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of parameter names.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of grid points (`None` on overflow).
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for values in self.params.values() {
            total = total.checked_mul(values.len())?;
        }
        Some(total)
    }

    pub fn validate(&self) -> GsResult<()> {
        for (name, values) in &self.params {
            if name.is_empty() {
                return Err(SearchError::InvalidGrid {
                    message: "parameter names must not be empty".to_string(),
                }
                .into());
            }
            if values.is_empty() {
                return Err(SearchError::InvalidGrid {
                    message: format!("parameter '{name}' has no candidate values"),
                }
                .into());
            }
        }
        if self.grid_size().is_none() {
            return Err(SearchError::InvalidGrid {
                message: "grid size overflows".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Every grid point, in enumeration order.
    pub fn candidates(&self) -> GsResult<Vec<ParamSet>> {
        self.validate()?;

        // Cartesian product
        let mut result: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, axis) in &self.params {
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for existing in &result {
                for value in axis {
                    let mut combo = existing.clone();
                    combo.insert(name.clone(), value.clone());
                    next.push(combo);
                }
            }
            result = next;
        }

        Ok(result)
    }

    /// Parse a grid from a JSON object of `name: [values...]`.
    pub fn from_json_str(json: &str) -> GsResult<Self> {
        let grid: Self = serde_json::from_str(json)?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> GsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// `start, start + step, ...` strictly below `stop`, rounded to 12 decimals.
pub fn float_range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step == 0.0 || !step.is_finite() || (stop - start) / step <= 0.0 {
        return Vec::new();
    }
    // tolerate float noise at the stop bound
    let count = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
    (0..count)
        .map(|i| {
            let v = start + i as f64 * step;
            (v * 1e12).round() / 1e12
        })
        .collect()
}
