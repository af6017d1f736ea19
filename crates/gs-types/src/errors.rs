use thiserror::Error;

/// Main error type for the gridsearch system
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Dataset loading errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Array '{name}' not found in archive {path}")]
    MissingArray { name: String, path: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Shape mismatch: {features} feature rows but {labels} labels")]
    ShapeMismatch { features: usize, labels: usize },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data writing failed: {message}")]
    WritingFailed { message: String },
}

/// Errors raised by the cross-validated search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid parameter grid: {message}")]
    InvalidGrid { message: String },

    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Invalid cross-validation setup: {message}")]
    InvalidSplit { message: String },

    #[error("Fit failed for candidate {candidate} on split {split}: {message}")]
    FitFailed {
        candidate: usize,
        split: usize,
        message: String,
    },

    #[error("All {candidates} candidates produced non-finite scores")]
    NoFiniteScores { candidates: usize },

    #[error("Thread pool setup failed: {message}")]
    ThreadPool { message: String },
}

/// Estimator errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown parameter '{parameter}' for estimator {estimator}")]
    UnknownParameter { estimator: String, parameter: String },

    #[error("Invalid value for parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Unsupported target: {message}")]
    UnsupportedTarget { message: String },

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Feature value at row {row}, column {column} is NaN or infinite")]
    NonFiniteFeature { row: usize, column: usize },

    #[error("Training failed: {message}")]
    TrainingFailed { message: String },
}

/// Result type alias for gridsearch operations
pub type GsResult<T> = Result<T, GsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::GsError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GsError::Config(format!($($arg)*))
    };
}
