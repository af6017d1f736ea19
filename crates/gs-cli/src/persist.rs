//! Writing the best model to disk.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use gs_types::GsResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// `grid_search_best_<name>_<score * 100, two decimals>.bin`
pub fn model_file_name(name: &str, best_score: f64) -> String {
    format!("grid_search_best_{}_{:.2}.bin", name, best_score * 100.0)
}

/// Serialize `model` to `path`, replacing any existing file.
pub fn save_model<T: Serialize, P: AsRef<Path>>(model: &T, path: P) -> GsResult<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(&mut writer, model)?;
    writer.flush()?;
    tracing::info!("Saved model to {}", path.as_ref().display());
    Ok(())
}

pub fn load_model<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> GsResult<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}
