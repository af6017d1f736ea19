use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::{Path, PathBuf};

use gs_types::{DataError, Dataset, GsResult};
use ndarray::{Array, ArrayD, Axis, Dimension, Ix1, Ix2};
use ndarray_npy::{
    NpzReader, NpzWriter, ReadNpyError, ReadNpzError, ReadableElement, WritableElement,
};
use num_traits::AsPrimitive;

/// Archive entry holding the feature matrix.
pub const FEATURES_KEY: &str = "X";
/// Archive entry holding the label vector.
pub const LABELS_KEY: &str = "y";

/// Arrays as read from the archive, widened to f64 but not yet shape-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArrays {
    pub features: ArrayD<f64>,
    pub labels: ArrayD<f64>,
}

impl RawArrays {
    /// Coerce to 32-bit floats and check the feature/label row invariant.
    ///
    /// `X` must be 2-D. `y` may be 1-D or a single column.
    pub fn into_dataset(self) -> GsResult<Dataset> {
        let features = match self.features.ndim() {
            2 => self
                .features
                .into_dimensionality::<Ix2>()
                .map_err(|e| DataError::InvalidFormat {
                    message: format!("Failed to read feature matrix: {}", e),
                })?,
            n => {
                return Err(DataError::InvalidFormat {
                    message: format!("Feature array must be 2-D, got {}-D", n),
                }
                .into())
            }
        };

        let label_shape = self.labels.shape().to_vec();
        let labels = match label_shape.as_slice() {
            [_] => self.labels,
            [_, 1] => self.labels.index_axis_move(Axis(1), 0),
            shape => {
                return Err(DataError::InvalidFormat {
                    message: format!(
                        "Label array must be 1-D or a single column, got shape {:?}",
                        shape
                    ),
                }
                .into())
            }
        };
        let labels = labels
            .into_dimensionality::<Ix1>()
            .map_err(|e| DataError::InvalidFormat {
                message: format!("Failed to read label vector: {}", e),
            })?;

        let features = features.mapv(|v| v as f32);
        let labels = labels.mapv(|v| v as f32);
        if let Some(position) = features.iter().position(|v| !v.is_finite()) {
            let (row, col) = (position / features.ncols(), position % features.ncols());
            return Err(DataError::InvalidFormat {
                message: format!(
                    "Feature matrix contains NaN or infinity at row {}, column {}",
                    row, col
                ),
            }
            .into());
        }
        if let Some(row) = labels.iter().position(|v| !v.is_finite()) {
            return Err(DataError::InvalidFormat {
                message: format!("Label vector contains NaN or infinity at row {}", row),
            }
            .into());
        }

        Dataset::new(features, labels)
    }
}

/// Reads `.npz` archives holding a feature matrix and a label vector.
#[derive(Debug, Clone)]
pub struct NpzLoader {
    features_key: String,
    labels_key: String,
}

impl NpzLoader {
    pub fn new() -> Self {
        Self::with_keys(FEATURES_KEY, LABELS_KEY)
    }

    pub fn with_keys(features_key: impl Into<String>, labels_key: impl Into<String>) -> Self {
        Self {
            features_key: features_key.into(),
            labels_key: labels_key.into(),
        }
    }

    /// Load and coerce in one step.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> GsResult<Dataset> {
        let dataset = self.load_arrays(path)?.into_dataset()?;
        tracing::debug!(
            "Dataset has {} samples, {} features, classes {:?}",
            dataset.n_samples(),
            dataset.n_features(),
            dataset.classes()
        );
        Ok(dataset)
    }

    /// Read the raw feature and label arrays. Any supported numeric dtype is
    /// widened to f64; numeric coercion is left to [`RawArrays::into_dataset`].
    pub fn load_arrays<P: AsRef<Path>>(&self, path: P) -> GsResult<RawArrays> {
        let path = path.as_ref();
        tracing::info!("Loading dataset archive from: {}", path.display());

        let file = File::open(path).map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        let mut npz = NpzReader::new(BufReader::new(file)).map_err(|e| DataError::InvalidFormat {
            message: format!("{} is not a valid .npz archive: {}", path.display(), e),
        })?;
        let names = npz.names().map_err(|e| DataError::InvalidFormat {
            message: format!("Failed to list arrays in {}: {}", path.display(), e),
        })?;
        tracing::debug!("Archive entries: {:?}", names);

        let features = read_entry(&mut npz, &names, &self.features_key, path)?;
        let labels = read_entry(&mut npz, &names, &self.labels_key, path)?;

        tracing::info!(
            "Loaded '{}' with shape {:?} and '{}' with shape {:?}",
            self.features_key,
            features.shape(),
            self.labels_key,
            labels.shape()
        );
        Ok(RawArrays { features, labels })
    }
}

impl Default for NpzLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_entry<R: Read + Seek>(
    npz: &mut NpzReader<R>,
    names: &[String],
    key: &str,
    path: &Path,
) -> GsResult<ArrayD<f64>> {
    let entry = names
        .iter()
        .find(|name| name.as_str() == key || name.strip_suffix(".npy") == Some(key))
        .ok_or_else(|| DataError::MissingArray {
            name: key.to_string(),
            path: path.display().to_string(),
        })?
        .clone();

    if let Some(array) = read_widened::<f64, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<f32, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<i64, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<i32, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<i16, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<i8, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<u64, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<u32, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<u16, R>(npz, &entry)? {
        return Ok(array);
    }
    if let Some(array) = read_widened::<u8, R>(npz, &entry)? {
        return Ok(array);
    }

    Err(DataError::InvalidFormat {
        message: format!("Array '{}' in {} has an unsupported dtype", key, path.display()),
    }
    .into())
}

/// `Ok(None)` when the stored dtype is not `T`.
fn read_widened<T, R>(npz: &mut NpzReader<R>, entry: &str) -> GsResult<Option<ArrayD<f64>>>
where
    T: ReadableElement + AsPrimitive<f64>,
    R: Read + Seek,
{
    let read: Result<ArrayD<T>, ReadNpzError> = npz.by_name(entry);
    match read {
        Ok(array) => Ok(Some(array.mapv(|v| AsPrimitive::<f64>::as_(v)))),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
        Err(e) => Err(DataError::InvalidFormat {
            message: format!("Failed to read array '{}': {}", entry, e),
        }
        .into()),
    }
}

/// Writes arrays into a `.npz` archive readable by [`NpzLoader`].
pub struct NpzArchiveWriter {
    path: PathBuf,
    inner: NpzWriter<BufWriter<File>>,
}

impl NpzArchiveWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> GsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: NpzWriter::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn add<T, D>(&mut self, name: &str, array: &Array<T, D>) -> GsResult<()>
    where
        T: WritableElement,
        D: Dimension,
    {
        self.inner
            .add_array(name, array)
            .map_err(|e| DataError::WritingFailed {
                message: format!("Failed to add '{}' to {}: {}", name, self.path.display(), e),
            })?;
        Ok(())
    }

    pub fn finish(self) -> GsResult<()> {
        let path = self.path;
        self.inner.finish().map_err(|e| DataError::WritingFailed {
            message: format!("Failed to finalize {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}

/// Write a dataset archive with the default `X`/`y` entry names.
pub fn save_dataset<P: AsRef<Path>>(path: P, dataset: &Dataset) -> GsResult<()> {
    let mut writer = NpzArchiveWriter::create(path)?;
    writer.add(FEATURES_KEY, &dataset.features().to_owned())?;
    writer.add(LABELS_KEY, &dataset.labels().to_owned())?;
    writer.finish()
}
