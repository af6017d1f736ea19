//! Load, search, report, persist.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use gs_data::NpzLoader;
use gs_models::GradientBoostingClassifier;
use gs_optimizer::{GridSearchCv, ParamSet, SearchRun};
use gs_types::internal_error;

use crate::config::RunConfig;
use crate::persist::{model_file_name, save_model};
use crate::report::{print_grid, print_results};

/// Positional arguments of one run.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub train_dataset_path: PathBuf,
    /// Label embedded in the output file name.
    pub name: String,
}

#[derive(Debug)]
pub struct RunSummary {
    pub best_score: f64,
    pub best_params: ParamSet,
    pub n_candidates: usize,
    pub model_path: PathBuf,
    pub run: SearchRun,
}

/// Run the whole search, writing the grid and the score table to `out`.
pub fn run<W: Write>(
    args: &RunArgs,
    config: &RunConfig,
    out: &mut W,
) -> anyhow::Result<RunSummary> {
    let dataset = NpzLoader::new()
        .load(&args.train_dataset_path)
        .with_context(|| format!("failed to load dataset {}", args.train_dataset_path.display()))?;

    let grid = config.param_grid().context("failed to build parameter grid")?;
    print_grid(&grid, out)?;

    let search = GridSearchCv::new(GradientBoostingClassifier::new(), grid, config.search_config());
    let outcome = search.fit_dataset(&dataset).context("grid search failed")?;

    print_results(&outcome.results, out)?;
    out.flush()?;

    let best_score = outcome.best_score();
    let best_params = outcome.best_params().clone();
    let n_candidates = outcome.results.len();
    let model = outcome
        .best_estimator
        .ok_or_else(|| internal_error!("search finished without a refit model"))?;

    let model_path = config.output_dir.join(model_file_name(&args.name, best_score));
    save_model(&model, &model_path)
        .with_context(|| format!("failed to save model to {}", model_path.display()))?;

    Ok(RunSummary {
        best_score,
        best_params,
        n_candidates,
        model_path,
        run: outcome.run,
    })
}
