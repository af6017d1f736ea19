//! Run settings read from the environment.

use std::path::PathBuf;

use gs_optimizer::{ParamGrid, SearchConfig};
use gs_types::{config_error, validation_error, GsResult};

use crate::grid::default_param_grid;

pub const OUTPUT_DIR_VAR: &str = "GRID_SEARCH_OUTPUT_DIR";
pub const GRID_FILE_VAR: &str = "GRID_SEARCH_GRID_FILE";
pub const CV_FOLDS_VAR: &str = "GRID_SEARCH_CV_FOLDS";
pub const N_JOBS_VAR: &str = "GRID_SEARCH_N_JOBS";

/// Settings for one `grid-search` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Directory the best model is written to.
    pub output_dir: PathBuf,
    /// JSON grid replacing the built-in one.
    pub grid_file: Option<PathBuf>,
    pub cv_folds: usize,
    pub n_jobs: i32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            grid_file: None,
            cv_folds: 5,
            n_jobs: -2,
        }
    }
}

impl RunConfig {
    pub fn from_env() -> GsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> GsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(OUTPUT_DIR_VAR) {
            config.output_dir = PathBuf::from(dir);
        }
        config.grid_file = get(GRID_FILE_VAR).map(PathBuf::from);
        if let Some(raw) = get(CV_FOLDS_VAR) {
            config.cv_folds = raw
                .trim()
                .parse()
                .map_err(|e| config_error!("{CV_FOLDS_VAR}={raw:?} is not a fold count: {e}"))?;
        }
        if let Some(raw) = get(N_JOBS_VAR) {
            config.n_jobs = raw
                .trim()
                .parse()
                .map_err(|e| config_error!("{N_JOBS_VAR}={raw:?} is not a worker count: {e}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GsResult<()> {
        if self.cv_folds < 2 {
            return Err(validation_error!(
                "cross-validation needs at least 2 folds, got {}",
                self.cv_folds
            ));
        }
        if self.n_jobs == 0 {
            return Err(validation_error!("n_jobs must be non-zero"));
        }
        Ok(())
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::new()
            .with_cv(self.cv_folds)
            .with_n_jobs(self.n_jobs)
            .with_return_train_score(true)
            .with_refit(true)
    }

    /// The grid from `grid_file` when set, otherwise the built-in grid.
    pub fn param_grid(&self) -> GsResult<ParamGrid> {
        match &self.grid_file {
            Some(path) => {
                tracing::info!("Loading parameter grid from {}", path.display());
                ParamGrid::from_json_file(path)
            }
            None => Ok(default_param_grid()),
        }
    }
}
