//! Gradient-boosted decision tree classifier backed by the `gbdt` crate.
//!
//! Binary targets only. The two label values are mapped to -1/+1 for
//! training and mapped back on prediction.

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use gs_optimizer::{accuracy, Estimator, ParamSet, ParameterValue};
use gs_types::{distinct_sorted, GsResult, ModelError};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const ESTIMATOR_NAME: &str = "GradientBoostingClassifier";

/// Loss optimised by the boosting stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostingLoss {
    /// Binomial deviance.
    LogLoss,
    /// Least squares on the -1/+1 targets.
    SquaredError,
    /// Least absolute deviation on the -1/+1 targets.
    AbsoluteError,
}

impl BoostingLoss {
    /// Accepts `deviance` as an older name for `log_loss`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "log_loss" | "deviance" => Some(Self::LogLoss),
            "squared_error" => Some(Self::SquaredError),
            "absolute_error" => Some(Self::AbsoluteError),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LogLoss => "log_loss",
            Self::SquaredError => "squared_error",
            Self::AbsoluteError => "absolute_error",
        }
    }

    fn gbdt_name(&self) -> &'static str {
        match self {
            Self::LogLoss => "LogLikelyhood",
            Self::SquaredError => "SquaredError",
            Self::AbsoluteError => "LAD",
        }
    }

    /// Raw predictions at or above this value map to the positive class.
    /// Log-loss predictions come back as probabilities.
    fn decision_threshold(&self) -> f32 {
        match self {
            Self::LogLoss => 0.5,
            Self::SquaredError | Self::AbsoluteError => 0.0,
        }
    }
}

/// Hyperparameters of [`GradientBoostingClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub loss: BoostingLoss,
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub max_depth: u32,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows sampled per stage. Below 1.0 training is randomised.
    pub subsample: f64,
    /// Fraction of features sampled per tree.
    pub max_features: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            loss: BoostingLoss::LogLoss,
            learning_rate: 0.1,
            n_estimators: 100,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: 1.0,
        }
    }
}

fn invalid(parameter: &str, message: impl Into<String>) -> ModelError {
    ModelError::InvalidParameter {
        parameter: parameter.to_string(),
        message: message.into(),
    }
}

fn positive_int(name: &str, value: &ParameterValue, min: i64) -> Result<i64, ModelError> {
    match value.as_i64() {
        Some(v) if v >= min => Ok(v),
        Some(v) => Err(invalid(name, format!("must be at least {min}, got {v}"))),
        None => Err(invalid(name, format!("expected an integer, got {value}"))),
    }
}

fn unit_fraction(name: &str, value: &ParameterValue) -> Result<f64, ModelError> {
    match value.as_f64() {
        Some(v) if v > 0.0 && v <= 1.0 => Ok(v),
        Some(v) => Err(invalid(name, format!("must be in (0, 1], got {v}"))),
        None => Err(invalid(name, format!("expected a number, got {value}"))),
    }
}

impl BoostingParams {
    /// Copy of `self` with `params` applied. Unknown names and out-of-range
    /// values are rejected.
    pub fn with_overrides(&self, params: &ParamSet) -> GsResult<Self> {
        let mut out = self.clone();
        for (name, value) in params {
            match name.as_str() {
                "loss" => {
                    out.loss = value
                        .as_str()
                        .and_then(BoostingLoss::parse)
                        .ok_or_else(|| invalid(name, format!("unsupported loss {value}")))?;
                }
                "learning_rate" => {
                    out.learning_rate = match value.as_f64() {
                        Some(v) if v > 0.0 && v.is_finite() => v,
                        _ => {
                            let message = format!("must be a positive number, got {value}");
                            return Err(invalid(name, message).into());
                        }
                    };
                }
                "n_estimators" => out.n_estimators = positive_int(name, value, 1)? as usize,
                "max_depth" => {
                    let depth = positive_int(name, value, 1)?;
                    out.max_depth = u32::try_from(depth)
                        .map_err(|_| invalid(name, format!("too large: {depth}")))?;
                }
                "min_samples_split" => {
                    out.min_samples_split = positive_int(name, value, 2)? as usize
                }
                "min_samples_leaf" => {
                    out.min_samples_leaf = positive_int(name, value, 1)? as usize
                }
                "subsample" => out.subsample = unit_fraction(name, value)?,
                "max_features" => out.max_features = unit_fraction(name, value)?,
                _ => {
                    return Err(ModelError::UnknownParameter {
                        estimator: ESTIMATOR_NAME.to_string(),
                        parameter: name.clone(),
                    }
                    .into())
                }
            }
        }
        Ok(out)
    }

    /// A split needs `min_samples_split` rows and leaves two children, so the
    /// backing trees enforce the larger of the two leaf bounds.
    pub fn effective_min_leaf(&self) -> usize {
        self.min_samples_leaf.max(self.min_samples_split.div_ceil(2))
    }

    fn to_config(&self, n_features: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(self.max_depth);
        cfg.set_iterations(self.n_estimators);
        cfg.set_shrinkage(self.learning_rate as f32);
        cfg.set_loss(self.loss.gbdt_name());
        cfg.set_min_leaf_size(self.effective_min_leaf());
        cfg.set_data_sample_ratio(self.subsample);
        cfg.set_feature_sample_ratio(self.max_features);
        cfg.set_training_optimization_level(2);
        cfg.set_debug(false);
        cfg
    }
}

/// `gbdt` panics on NaN while sorting split candidates.
fn check_finite(features: ArrayView2<'_, f32>) -> Result<(), ModelError> {
    match features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, column), _)) => Err(ModelError::NonFiniteFeature { row, column }),
        None => Ok(()),
    }
}

/// A trained booster plus what is needed to translate its output back to the
/// original labels.
#[derive(Serialize, Deserialize)]
pub struct BoostedModel {
    params: BoostingParams,
    /// `[negative, positive]` label values.
    classes: [f32; 2],
    n_features: usize,
    booster: GBDT,
}

impl std::fmt::Debug for BoostedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostedModel")
            .field("params", &self.params)
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl BoostedModel {
    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn classes(&self) -> [f32; 2] {
        self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Raw booster output per row: a positive-class probability for log
    /// loss, a signed margin otherwise.
    pub fn decision_values(&self, features: ArrayView2<'_, f32>) -> GsResult<Vec<f32>> {
        if features.ncols() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: features.ncols(),
            }
            .into());
        }
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }
        check_finite(features)?;
        let rows: DataVec = features
            .rows()
            .into_iter()
            .map(|row| Data::new_test_data(row.to_vec(), None))
            .collect();
        Ok(self.booster.predict(&rows))
    }

    /// Predicted labels, in the original label values.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> GsResult<Vec<f32>> {
        let threshold = self.params.loss.decision_threshold();
        let [negative, positive] = self.classes;
        Ok(self
            .decision_values(features)?
            .into_iter()
            .map(|v| if v >= threshold { positive } else { negative })
            .collect())
    }
}

/// Gradient boosting for binary classification.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostingClassifier {
    defaults: BoostingParams,
}

impl GradientBoostingClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values used for every parameter the grid does not set.
    pub fn with_defaults(defaults: BoostingParams) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &BoostingParams {
        &self.defaults
    }
}

impl Estimator for GradientBoostingClassifier {
    type Model = BoostedModel;

    fn name(&self) -> &str {
        ESTIMATOR_NAME
    }

    fn is_classifier(&self) -> bool {
        true
    }

    fn check_params(&self, params: &ParamSet) -> GsResult<()> {
        self.defaults.with_overrides(params).map(|_| ())
    }

    fn fit(
        &self,
        params: &ParamSet,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<BoostedModel> {
        let params = self.defaults.with_overrides(params)?;
        if features.nrows() == 0 {
            return Err(ModelError::TrainingFailed {
                message: "no training samples".to_string(),
            }
            .into());
        }
        check_finite(features)?;

        let classes = distinct_sorted(labels);
        let classes: [f32; 2] = match classes.as_slice() {
            [negative, positive] => [*negative, *positive],
            [_] => {
                return Err(ModelError::UnsupportedTarget {
                    message: "training labels contain a single class".to_string(),
                }
                .into())
            }
            other => {
                return Err(ModelError::UnsupportedTarget {
                    message: format!("expected 2 classes, found {}", other.len()),
                }
                .into())
            }
        };

        let mut rows: DataVec = features
            .rows()
            .into_iter()
            .zip(labels.iter())
            .map(|(row, label)| {
                let target = if label.total_cmp(&classes[1]).is_eq() { 1.0 } else { -1.0 };
                Data::new_training_data(row.to_vec(), 1.0, target, None)
            })
            .collect();

        let mut booster = GBDT::new(&params.to_config(features.ncols()));
        booster.fit(&mut rows);
        tracing::trace!(
            "Trained {} stages of depth {} on {} rows",
            params.n_estimators,
            params.max_depth,
            rows.len()
        );

        Ok(BoostedModel {
            params,
            classes,
            n_features: features.ncols(),
            booster,
        })
    }

    fn score(
        &self,
        model: &BoostedModel,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<f64> {
        let predicted = model.predict(features)?;
        Ok(accuracy(&predicted, labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::GsError;
    use ndarray::{Array1, Array2};

    fn separable(n: usize, negative: f32, positive: f32) -> (Array2<f32>, Array1<f32>) {
        let features = Array2::from_shape_fn((n, 2), |(i, j)| match j {
            0 => i as f32,
            _ => ((i * 3) % 4) as f32,
        });
        let labels =
            Array1::from_iter((0..n).map(|i| if i >= n / 2 { positive } else { negative }));
        (features, labels)
    }

    fn params(pairs: &[(&str, ParameterValue)]) -> ParamSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn overrides_apply_and_validate() {
        let base = BoostingParams::default();
        let tuned = base
            .with_overrides(&params(&[
                ("loss", ParameterValue::from("deviance")),
                ("learning_rate", ParameterValue::Float(0.05)),
                ("n_estimators", ParameterValue::Float(200.0)),
                ("max_depth", ParameterValue::Int(6)),
                ("min_samples_split", ParameterValue::Int(10)),
                ("min_samples_leaf", ParameterValue::Int(2)),
            ]))
            .unwrap();
        assert_eq!(tuned.loss, BoostingLoss::LogLoss);
        assert_eq!(tuned.learning_rate, 0.05);
        assert_eq!(tuned.n_estimators, 200);
        assert_eq!(tuned.max_depth, 6);
        assert_eq!(tuned.effective_min_leaf(), 5);
    }

    #[test]
    fn effective_min_leaf_takes_larger_bound() {
        let mut p = BoostingParams::default();
        p.min_samples_split = 3;
        p.min_samples_leaf = 1;
        assert_eq!(p.effective_min_leaf(), 2);
        p.min_samples_leaf = 10;
        assert_eq!(p.effective_min_leaf(), 10);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let clf = GradientBoostingClassifier::new();
        let cases = vec![
            params(&[("loss", ParameterValue::from("exponential"))]),
            params(&[("loss", ParameterValue::Int(1))]),
            params(&[("learning_rate", ParameterValue::Float(0.0))]),
            params(&[("n_estimators", ParameterValue::Float(2.5))]),
            params(&[("min_samples_split", ParameterValue::Int(1))]),
            params(&[("subsample", ParameterValue::Float(1.5))]),
            params(&[("max_features", ParameterValue::from("sqrt"))]),
        ];
        for case in cases {
            assert!(
                matches!(
                    clf.check_params(&case),
                    Err(GsError::Model(ModelError::InvalidParameter { .. }))
                ),
                "expected rejection for {case:?}"
            );
        }
        assert!(matches!(
            clf.check_params(&params(&[("criterion", ParameterValue::from("mse"))])),
            Err(GsError::Model(ModelError::UnknownParameter { .. }))
        ));
    }

    #[test]
    fn learns_separable_classes() {
        let (x, y) = separable(40, 0.0, 1.0);
        let clf = GradientBoostingClassifier::new();
        let grid_point = params(&[
            ("n_estimators", ParameterValue::Int(20)),
            ("learning_rate", ParameterValue::Float(0.3)),
        ]);
        let model = clf.fit(&grid_point, x.view(), y.view()).unwrap();
        assert_eq!(model.classes(), [0.0, 1.0]);
        assert_eq!(model.n_features(), 2);
        let score = clf.score(&model, x.view(), y.view()).unwrap();
        assert!(score >= 0.9, "training accuracy too low: {score}");
    }

    #[test]
    fn predictions_use_original_labels() {
        let (x, y) = separable(30, 3.0, 7.0);
        let clf = GradientBoostingClassifier::new();
        let grid_point = params(&[
            ("loss", ParameterValue::from("squared_error")),
            ("n_estimators", ParameterValue::Int(10)),
        ]);
        let model = clf.fit(&grid_point, x.view(), y.view()).unwrap();
        let predicted = model.predict(x.view()).unwrap();
        assert_eq!(predicted.len(), 30);
        assert!(predicted.iter().all(|p| *p == 3.0 || *p == 7.0));
    }

    #[test]
    fn non_binary_targets_are_rejected() {
        let clf = GradientBoostingClassifier::new();
        let x = Array2::<f32>::zeros((6, 2));

        let one_class = Array1::from_elem(6, 1.0f32);
        assert!(matches!(
            clf.fit(&ParamSet::new(), x.view(), one_class.view()),
            Err(GsError::Model(ModelError::UnsupportedTarget { .. }))
        ));

        let three_classes = Array1::from_vec(vec![0.0f32, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert!(matches!(
            clf.fit(&ParamSet::new(), x.view(), three_classes.view()),
            Err(GsError::Model(ModelError::UnsupportedTarget { .. }))
        ));
    }

    #[test]
    fn feature_count_is_checked_on_predict() {
        let (x, y) = separable(20, 0.0, 1.0);
        let clf = GradientBoostingClassifier::new();
        let model = clf
            .fit(&params(&[("n_estimators", ParameterValue::Int(5))]), x.view(), y.view())
            .unwrap();
        let wrong = Array2::<f32>::zeros((3, 5));
        assert!(matches!(
            model.predict(wrong.view()),
            Err(GsError::Model(ModelError::FeatureMismatch { expected: 2, actual: 5 }))
        ));
        assert!(model.predict(Array2::<f32>::zeros((0, 2)).view()).unwrap().is_empty());
    }

    #[test]
    fn non_finite_features_are_rejected() {
        let (mut x, y) = separable(20, 0.0, 1.0);
        x[[3, 0]] = f32::NAN;
        let clf = GradientBoostingClassifier::new();
        let grid_point = params(&[("n_estimators", ParameterValue::Int(5))]);
        assert!(matches!(
            clf.fit(&grid_point, x.view(), y.view()),
            Err(GsError::Model(ModelError::NonFiniteFeature { row: 3, column: 0 }))
        ));

        x[[3, 0]] = 3.0;
        let model = clf.fit(&grid_point, x.view(), y.view()).unwrap();
        x[[7, 1]] = f32::INFINITY;
        assert!(matches!(
            model.predict(x.view()),
            Err(GsError::Model(ModelError::NonFiniteFeature { row: 7, column: 1 }))
        ));
    }
}
