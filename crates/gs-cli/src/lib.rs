//! # gs-cli
//!
//! Library half of the `grid-search` binary: environment configuration, the
//! built-in parameter grid, console reporting, model persistence and the
//! end-to-end pipeline.

pub mod config;
pub mod grid;
pub mod persist;
pub mod pipeline;
pub mod report;

pub use config::RunConfig;
pub use grid::default_param_grid;
pub use persist::{load_model, model_file_name, save_model};
pub use pipeline::{run, RunArgs, RunSummary};
pub use report::{format_grid, print_grid, print_results};
