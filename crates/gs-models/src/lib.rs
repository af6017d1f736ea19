//! # gs-models
//!
//! Estimators that plug into [`gs_optimizer::GridSearchCv`].

pub mod gradient_boosting;

pub use gradient_boosting::{BoostedModel, BoostingLoss, BoostingParams, GradientBoostingClassifier};
