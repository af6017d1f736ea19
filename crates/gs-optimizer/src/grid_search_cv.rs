//! Exhaustive cross-validated search over a parameter grid.

use std::time::Instant;

use gs_types::{DataError, Dataset, GsResult, SearchError};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::estimator::Estimator;
use crate::results::{CandidateResult, CvResults};
use crate::search::{format_params, ParamGrid, ParamSet};
use crate::split::{CrossValidator, KFold, Split, StratifiedKFold};
use crate::trial::{FitRecord, SearchRun};

/// Settings for a [`GridSearchCv`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of folds.
    pub cv: usize,
    /// Worker count. Negative values count back from the number of CPUs:
    /// -1 uses every CPU, -2 all but one.
    pub n_jobs: i32,
    /// Also score each fitted model on its own training rows.
    pub return_train_score: bool,
    /// Refit the best parameters on the full data once the search finishes.
    pub refit: bool,
    /// Shuffle samples before splitting, with this seed.
    pub shuffle_seed: Option<u64>,
    /// Score recorded for a failed fit. `None` aborts the search instead.
    pub error_score: Option<f64>,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self {
            cv: 5,
            n_jobs: -2,
            return_train_score: true,
            refit: true,
            shuffle_seed: None,
            error_score: None,
        }
    }

    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv = folds;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i32) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_return_train_score(mut self, enabled: bool) -> Self {
        self.return_train_score = enabled;
        self
    }

    pub fn with_refit(mut self, enabled: bool) -> Self {
        self.refit = enabled;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_error_score(mut self, score: f64) -> Self {
        self.error_score = Some(score);
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve an `n_jobs` setting against the number of available CPUs.
pub fn resolve_n_jobs(n_jobs: i32, available: usize) -> GsResult<usize> {
    match n_jobs {
        0 => Err(SearchError::InvalidParameter {
            parameter: "n_jobs".to_string(),
            message: "must be non-zero".to_string(),
        }
        .into()),
        n if n > 0 => Ok(n as usize),
        n => Ok((available as i64 + 1 + n as i64).max(1) as usize),
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Everything a finished search produces.
#[derive(Debug)]
pub struct GridSearchOutcome<M> {
    pub results: CvResults,
    /// The best parameters refit on all rows; `None` when refit is disabled.
    pub best_estimator: Option<M>,
    /// Seconds spent on the refit.
    pub refit_time: Option<f64>,
    pub run: SearchRun,
}

impl<M> GridSearchOutcome<M> {
    pub fn best_index(&self) -> usize {
        self.results.best_index()
    }

    pub fn best_score(&self) -> f64 {
        self.results.best_score()
    }

    pub fn best_params(&self) -> &ParamSet {
        self.results.best_params()
    }
}

/// Cross-validated exhaustive search: every grid point is fit and scored on
/// every fold, and the grid point with the highest mean validation score wins.
pub struct GridSearchCv<E: Estimator> {
    estimator: E,
    grid: ParamGrid,
    config: SearchConfig,
}

impl<E: Estimator> GridSearchCv<E> {
    pub fn new(estimator: E, grid: ParamGrid, config: SearchConfig) -> Self {
        Self {
            estimator,
            grid,
            config,
        }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn splitter(&self) -> Box<dyn CrossValidator> {
        if self.estimator.is_classifier() {
            let splitter = StratifiedKFold::new(self.config.cv);
            match self.config.shuffle_seed {
                Some(seed) => Box::new(splitter.with_shuffle_seed(seed)),
                None => Box::new(splitter),
            }
        } else {
            let splitter = KFold::new(self.config.cv);
            match self.config.shuffle_seed {
                Some(seed) => Box::new(splitter.with_shuffle_seed(seed)),
                None => Box::new(splitter),
            }
        }
    }

    pub fn fit_dataset(&self, dataset: &Dataset) -> GsResult<GridSearchOutcome<E::Model>> {
        self.fit(dataset.features(), dataset.labels())
    }

    /// Run the search. Blocks until every fit has finished.
    pub fn fit(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<GridSearchOutcome<E::Model>> {
        if features.nrows() != labels.len() {
            return Err(DataError::ShapeMismatch {
                features: features.nrows(),
                labels: labels.len(),
            }
            .into());
        }

        let candidates = self.grid.candidates()?;
        for params in &candidates {
            self.estimator.check_params(params)?;
        }

        let splitter = self.splitter();
        let splits = splitter.split(labels)?;
        let n_workers = resolve_n_jobs(self.config.n_jobs, available_cpus())?;

        let mut run = SearchRun::new(
            self.estimator.name(),
            splitter.name(),
            candidates.len(),
            splits.len(),
        );
        tracing::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            splits.len(),
            candidates.len(),
            run.total_fits()
        );
        run.mark_running(n_workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build()
            .map_err(|e| SearchError::ThreadPool {
                message: e.to_string(),
            })?;

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |s| (c, s)))
            .collect();
        let outcomes: Vec<GsResult<FitRecord>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, s)| self.evaluate(c, &candidates[c], s, &splits[s], features, labels))
                .collect()
        });

        let mut records = Vec::with_capacity(outcomes.len());
        for (&(candidate, split), outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Ok(record) => {
                    run.record_fit(true);
                    records.push(record);
                }
                Err(e) => {
                    run.record_fit(false);
                    match self.config.error_score {
                        Some(score) => {
                            tracing::warn!(
                                "Fit failed for {} on split {}, scoring {}: {}",
                                format_params(&candidates[candidate]),
                                split,
                                score,
                                e
                            );
                            records.push(FitRecord::substituted(
                                candidate,
                                split,
                                score,
                                self.config.return_train_score,
                            ));
                        }
                        None => {
                            run.mark_failed(e.to_string());
                            return Err(SearchError::FitFailed {
                                candidate,
                                split,
                                message: e.to_string(),
                            }
                            .into());
                        }
                    }
                }
            }
        }

        let n_splits = splits.len();
        let table: Vec<CandidateResult> = candidates
            .into_iter()
            .zip(records.chunks(n_splits))
            .map(|(params, chunk)| CandidateResult::from_records(params, chunk))
            .collect();
        for (index, candidate) in table.iter().enumerate() {
            run.update_best(index, candidate.mean_test_score);
        }
        let results = match CvResults::new(table, n_splits) {
            Ok(results) => results,
            Err(e) => {
                run.mark_failed(e.to_string());
                return Err(e);
            }
        };

        tracing::info!(
            "Best mean score {:.6} for {}",
            results.best_score(),
            format_params(results.best_params())
        );

        let (best_estimator, refit_time) = if self.config.refit {
            let started = Instant::now();
            let model = self
                .estimator
                .fit(results.best_params(), features, labels)
                .inspect_err(|e| run.mark_failed(e.to_string()))?;
            let elapsed = started.elapsed().as_secs_f64();
            tracing::info!("Refit best candidate on {} samples in {:.3}s", labels.len(), elapsed);
            (Some(model), Some(elapsed))
        } else {
            (None, None)
        };

        run.mark_completed();
        Ok(GridSearchOutcome {
            results,
            best_estimator,
            refit_time,
            run,
        })
    }

    fn evaluate(
        &self,
        candidate: usize,
        params: &ParamSet,
        split_index: usize,
        split: &Split,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, f32>,
    ) -> GsResult<FitRecord> {
        let train_x = features.select(Axis(0), &split.train);
        let train_y = labels.select(Axis(0), &split.train);
        let test_x = features.select(Axis(0), &split.test);
        let test_y = labels.select(Axis(0), &split.test);

        let started = Instant::now();
        let model = self.estimator.fit(params, train_x.view(), train_y.view())?;
        let fit_time = started.elapsed().as_secs_f64();

        let started = Instant::now();
        let test_score = self.estimator.score(&model, test_x.view(), test_y.view())?;
        let score_time = started.elapsed().as_secs_f64();

        let train_score = if self.config.return_train_score {
            Some(self.estimator.score(&model, train_x.view(), train_y.view())?)
        } else {
            None
        };

        tracing::debug!(
            "[CV {}/{}] {} score={:.3} fit={:.3}s",
            split_index + 1,
            self.config.cv,
            format_params(params),
            test_score,
            fit_time
        );

        Ok(FitRecord {
            candidate,
            split: split_index,
            test_score,
            train_score,
            fit_time,
            score_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::accuracy;
    use crate::search::ParameterValue;
    use gs_types::{GsError, ModelError};
    use ndarray::{Array1, Array2};

    /// Predicts 1 when the chosen feature exceeds the threshold.
    struct Stump;

    #[derive(Debug, PartialEq)]
    struct StumpModel {
        feature: usize,
        threshold: f32,
    }

    impl Estimator for Stump {
        type Model = StumpModel;

        fn name(&self) -> &str {
            "stump"
        }

        fn is_classifier(&self) -> bool {
            true
        }

        fn check_params(&self, params: &ParamSet) -> GsResult<()> {
            for name in params.keys() {
                if name != "feature" && name != "threshold" {
                    return Err(ModelError::UnknownParameter {
                        estimator: "stump".into(),
                        parameter: name.clone(),
                    }
                    .into());
                }
            }
            Ok(())
        }

        fn fit(
            &self,
            params: &ParamSet,
            _features: ArrayView2<'_, f32>,
            _labels: ArrayView1<'_, f32>,
        ) -> GsResult<StumpModel> {
            let threshold = params.get("threshold").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if threshold < 0.0 {
                return Err(ModelError::TrainingFailed {
                    message: "negative threshold".into(),
                }
                .into());
            }
            Ok(StumpModel {
                feature: params.get("feature").and_then(|v| v.as_i64()).unwrap_or(0) as usize,
                threshold: threshold as f32,
            })
        }

        fn score(
            &self,
            model: &StumpModel,
            features: ArrayView2<'_, f32>,
            labels: ArrayView1<'_, f32>,
        ) -> GsResult<f64> {
            let predicted: Vec<f32> = features
                .column(model.feature)
                .iter()
                .map(|v| if *v > model.threshold { 1.0 } else { 0.0 })
                .collect();
            Ok(accuracy(&predicted, labels))
        }
    }

    /// 20 samples: feature 0 separates the classes at 9.5, feature 1 is noise.
    fn sample_data() -> (Array2<f32>, Array1<f32>) {
        let features = Array2::from_shape_fn((20, 2), |(i, j)| match j {
            0 => i as f32,
            _ => ((i * 7) % 5) as f32,
        });
        let labels = Array1::from_iter((0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }));
        (features, labels)
    }

    fn sample_grid() -> ParamGrid {
        ParamGrid::new()
            .add_ints("feature", &[0, 1])
            .add_floats("threshold", &[2.5, 9.5, 15.5])
    }

    #[test]
    fn search_finds_separating_stump() {
        let (x, y) = sample_data();
        let search = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new().with_n_jobs(2));
        let outcome = search.fit(x.view(), y.view()).unwrap();

        assert_eq!(outcome.results.len(), 6);
        assert!(outcome
            .results
            .candidates()
            .iter()
            .all(|c| c.split_test_scores.len() == 5));
        assert_eq!(outcome.best_score(), 1.0);
        assert_eq!(outcome.best_params()["feature"], ParameterValue::Int(0));
        assert_eq!(outcome.best_params()["threshold"], ParameterValue::Float(9.5));
        assert_eq!(
            outcome.best_estimator,
            Some(StumpModel {
                feature: 0,
                threshold: 9.5
            })
        );
        assert!(outcome.refit_time.is_some());
        assert_eq!(outcome.run.fits_completed, 30);
        assert_eq!(outcome.run.best.as_ref().unwrap().candidate, outcome.best_index());
    }

    #[test]
    fn best_score_is_max_mean() {
        let (x, y) = sample_data();
        let outcome = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new())
            .fit(x.view(), y.view())
            .unwrap();
        let max_mean = outcome
            .results
            .mean_test_scores()
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.best_score(), max_mean);
        assert_eq!(outcome.results.best().rank_test_score, 1);
    }

    #[test]
    fn rerun_is_deterministic() {
        let (x, y) = sample_data();
        let first = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new().with_n_jobs(1))
            .fit(x.view(), y.view())
            .unwrap();
        let second = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new().with_n_jobs(-1))
            .fit(x.view(), y.view())
            .unwrap();
        assert_eq!(first.best_params(), second.best_params());
        assert_eq!(first.results.mean_test_scores(), second.results.mean_test_scores());
        assert_ne!(first.run.id, second.run.id);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let (x, y) = sample_data();
        // both thresholds separate integer-valued feature 0 perfectly
        let grid = ParamGrid::new()
            .add_ints("feature", &[0])
            .add_floats("threshold", &[9.5, 9.7]);
        let outcome = GridSearchCv::new(Stump, grid, SearchConfig::new())
            .fit(x.view(), y.view())
            .unwrap();
        assert_eq!(outcome.best_index(), 0);
        assert!(outcome.results.candidates().iter().all(|c| c.rank_test_score == 1));
    }

    #[test]
    fn unknown_parameter_rejected_before_fitting() {
        let (x, y) = sample_data();
        let grid = sample_grid().add_ints("depth", &[3]);
        let err = GridSearchCv::new(Stump, grid, SearchConfig::new())
            .fit(x.view(), y.view())
            .unwrap_err();
        assert!(matches!(
            err,
            GsError::Model(ModelError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn fit_failure_aborts_by_default() {
        let (x, y) = sample_data();
        let grid = ParamGrid::new().add_floats("threshold", &[9.5, -1.0]);
        let err = GridSearchCv::new(Stump, grid, SearchConfig::new())
            .fit(x.view(), y.view())
            .unwrap_err();
        match err {
            GsError::Search(SearchError::FitFailed { candidate, split, .. }) => {
                assert_eq!(candidate, 1);
                assert_eq!(split, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_score_substitutes_failed_fits() {
        let (x, y) = sample_data();
        let grid = ParamGrid::new().add_floats("threshold", &[9.5, -1.0]);
        let outcome = GridSearchCv::new(Stump, grid, SearchConfig::new().with_error_score(0.0))
            .fit(x.view(), y.view())
            .unwrap();
        assert_eq!(outcome.results.candidates()[1].mean_test_score, 0.0);
        assert_eq!(outcome.best_index(), 0);
        assert_eq!(outcome.run.fits_failed, 5);
    }

    #[test]
    fn refit_and_train_scores_can_be_disabled() {
        let (x, y) = sample_data();
        let config = SearchConfig::new()
            .with_refit(false)
            .with_return_train_score(false)
            .with_cv(4);
        let outcome = GridSearchCv::new(Stump, sample_grid(), config)
            .fit(x.view(), y.view())
            .unwrap();
        assert!(outcome.best_estimator.is_none());
        assert!(outcome.refit_time.is_none());
        assert!(outcome.results.candidates()[0].mean_train_score.is_none());
        assert_eq!(outcome.results.n_splits(), 4);
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let (x, _) = sample_data();
        let y = Array1::<f32>::zeros(19);
        let err = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new())
            .fit(x.view(), y.view())
            .unwrap_err();
        assert!(matches!(err, GsError::Data(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn fit_dataset_matches_fit() {
        let (x, y) = sample_data();
        let dataset = Dataset::new(x, y).unwrap();
        let outcome = GridSearchCv::new(Stump, sample_grid(), SearchConfig::new())
            .fit_dataset(&dataset)
            .unwrap();
        assert_eq!(outcome.best_score(), 1.0);
    }

    #[test]
    fn n_jobs_resolution() {
        assert_eq!(resolve_n_jobs(4, 8).unwrap(), 4);
        assert_eq!(resolve_n_jobs(-1, 8).unwrap(), 8);
        assert_eq!(resolve_n_jobs(-2, 8).unwrap(), 7);
        assert_eq!(resolve_n_jobs(-2, 1).unwrap(), 1);
        assert_eq!(resolve_n_jobs(-20, 8).unwrap(), 1);
        assert!(resolve_n_jobs(0, 8).is_err());
    }
}
