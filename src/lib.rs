pub mod datasets;
pub mod io;
pub mod report;

// Re-export public API
pub use cupping_core::{r2_score, rmse, utils, CuppingError, Float, Matrix, Result, Vector};
pub use cupping_models::{LinearRegression, RegressionTree};
pub use datasets::{train_test_split, TrainTestSplit};
pub use io::{load_csv, read_csv, Dataset, DEFAULT_FEATURE_COLUMNS, DEFAULT_TARGET_COLUMN};
pub use report::{EvaluationReport, FeatureScore, Scores};
