//! `grid-search <TRAIN_DATASET_PATH> <NAME>`
//!
//! Cross-validated grid search over a gradient-boosting classifier. The best
//! model is written to `grid_search_best_<NAME>_<score>.bin`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gs_cli::{run, RunArgs, RunConfig};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "grid-search")]
#[command(version)]
#[command(
    about = "Grid search a gradient-boosting classifier and save the best model",
    long_about = None
)]
struct Cli {
    /// `.npz` archive holding `X` and `y`
    train_dataset_path: PathBuf,

    /// This run's name
    name: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::from_env().context("invalid configuration")?;
    let args = RunArgs {
        train_dataset_path: cli.train_dataset_path,
        name: cli.name,
    };

    let stdout = std::io::stdout();
    let summary = run(&args, &config, &mut stdout.lock())?;
    tracing::info!(
        "Run {} finished {} fits in {:.1}s, model at {}",
        summary.run.id,
        summary.run.fits_completed,
        summary.run.elapsed_seconds().unwrap_or_default(),
        summary.model_path.display()
    );
    Ok(())
}
