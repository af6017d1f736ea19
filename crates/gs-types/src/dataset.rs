use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::errors::{DataError, GsResult};

/// Training data: one feature row per sample and one label per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Array1<f32>,
}

impl Dataset {
    /// Build a dataset, rejecting feature/label row counts that disagree.
    pub fn new(features: Array2<f32>, labels: Array1<f32>) -> GsResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DataError::ShapeMismatch {
                features: features.nrows(),
                labels: labels.len(),
            }
            .into());
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, f32> {
        self.labels.view()
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Distinct label values in ascending order.
    pub fn classes(&self) -> Vec<f32> {
        distinct_sorted(self.labels.view())
    }
}

/// Distinct values of `values` in ascending order. NaN labels sort last.
pub fn distinct_sorted(values: ArrayView1<'_, f32>) -> Vec<f32> {
    let mut out: Vec<f32> = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out.dedup_by(|a, b| a.total_cmp(b).is_eq());
    out
}
