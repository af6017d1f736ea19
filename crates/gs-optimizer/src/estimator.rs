//! The seam between the search and whatever model library is being tuned.

use gs_types::GsResult;
use ndarray::{ArrayView1, ArrayView2};

use crate::search::ParamSet;

/// A trainable model family whose hyperparameters are supplied per fit.
///
/// Implementations must be shareable across the worker threads that evaluate
/// grid points in parallel.
pub trait Estimator: Send + Sync {
    /// The trained model produced by [`Estimator::fit`].
    type Model;

    /// Human-readable estimator name.
    fn name(&self) -> &str;

    /// Classifiers get stratified folds.
    fn is_classifier(&self) -> bool {
        false
    }

    /// Reject unknown names or ill-typed values before any fit starts.
    fn check_params(&self, params: &ParamSet) -> GsResult<()>;

    fn fit(
        &self,
        params: &ParamSet,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<Self::Model>;

    /// Higher is better.
    fn score(
        &self,
        model: &Self::Model,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<f64>;
}

/// Fraction of predictions equal to the true labels. Empty input scores 0.
pub fn accuracy(predicted: &[f32], labels: ArrayView1<'_, f32>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(labels.iter())
        .filter(|(p, y)| p == y)
        .count();
    correct as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn accuracy_counts_matches() {
        let labels = array![1.0f32, 0.0, 1.0, 1.0];
        assert_eq!(accuracy(&[1.0, 0.0, 0.0, 1.0], labels.view()), 0.75);
        assert_eq!(accuracy(&[], Array1::<f32>::zeros(0).view()), 0.0);
    }
}
