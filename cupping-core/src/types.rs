/// Scalar type used for features, targets and model parameters.
pub type Float = f64;

/// Sample-major feature matrix: one row per sample, one column per feature.
pub type Matrix = nalgebra::DMatrix<Float>;

/// Column vector of targets or predictions.
pub type Vector = nalgebra::DVector<Float>;
