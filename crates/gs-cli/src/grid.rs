//! Built-in search space for the gradient-boosting classifier.

use gs_optimizer::ParamGrid;

/// 2 losses x 9 learning rates x 4 x 4 x 4 x 6 = 6912 grid points.
pub fn default_param_grid() -> ParamGrid {
    ParamGrid::new()
        .add_strs("loss", &["log_loss", "squared_error"])
        .add_float_range("learning_rate", 0.05, 0.5, 0.05)
        .add_ints("n_estimators", &[50, 100, 200, 300])
        .add_ints("min_samples_split", &[2, 3, 5, 10])
        .add_ints("min_samples_leaf", &[2, 3, 5, 10])
        .add_ints("max_depth", &[3, 4, 5, 6, 8, 10])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_models::GradientBoostingClassifier;
    use gs_optimizer::{Estimator, ParameterValue};

    #[test]
    fn default_grid_shape() {
        let grid = default_param_grid();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.grid_size(), Some(6912));

        let rates: Vec<f64> = grid
            .values("learning_rate")
            .unwrap()
            .iter()
            .filter_map(ParameterValue::as_f64)
            .collect();
        assert_eq!(rates, vec![0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45]);
    }

    #[test]
    fn every_default_candidate_is_accepted() {
        let clf = GradientBoostingClassifier::new();
        for params in default_param_grid().candidates().unwrap() {
            clf.check_params(&params).unwrap();
        }
    }
}
