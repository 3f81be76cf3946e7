use std::fmt;

#[derive(Debug)]
pub enum CuppingError {
    /// IO-related failures (file not found, unreadable, etc.)
    Io(String),

    /// CSV parsing / formatting issues
    Csv(String),

    /// Shape or dimensionality mismatch
    ShapeMismatch { expected: String, got: String },

    /// Model used before calling `fit`
    NotFitted,

    /// Feature not enabled at compile time
    FeatureDisabled(&'static str),

    /// The training dataset contains zero samples.
    EmptyTrainingData,

    /// Invalid Hyperparameter Value
    InvalidHyperparameter { name: String, value: String },

    /// Invalid value
    InvalidValue { message: String },

    /// A fitted split references a feature the sample does not have.
    FeatureOutOfRange { index: usize, len: usize },

    /// A requested column is absent from the CSV header.
    MissingColumn(String),
}

impl fmt::Display for CuppingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for CuppingError {}

impl From<std::io::Error> for CuppingError {
    fn from(err: std::io::Error) -> Self {
        CuppingError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CuppingError>;
