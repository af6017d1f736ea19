//! # gs-data
//!
//! Dataset archive loading for gridsearch. Reads `.npz` archives holding a
//! feature matrix `X` and a label vector `y`, and writes archives in the same
//! layout.

pub mod loaders;

pub use loaders::*;
