//! # gs-optimizer
//!
//! Cross-validated hyperparameter search for gridsearch.
//!
//! Provides parameter grid definitions, fold splitters (plain and
//! stratified k-fold), the [`Estimator`] seam that model libraries implement,
//! and [`GridSearchCv`], which fits every grid point on every fold in parallel
//! and selects the grid point with the highest mean validation score.

mod estimator;
mod grid_search_cv;
mod results;
mod search;
mod split;
mod trial;

pub use estimator::{accuracy, Estimator};
pub use grid_search_cv::{resolve_n_jobs, GridSearchCv, GridSearchOutcome, SearchConfig};
pub use results::{mean, rank_descending, std_dev, CandidateResult, CvResults};
pub use search::{float_range, format_params, ParamGrid, ParamSet, ParameterValue};
pub use split::{CrossValidator, KFold, Split, StratifiedKFold};
pub use trial::{BestCandidate, FitRecord, RunState, SearchRun, SearchRunId};
