pub mod error;
pub mod impurity;
pub mod metrics;
pub mod types;
pub mod utils;

pub use types::{Float, Matrix, Vector};

pub use error::{CuppingError, Result};

pub use impurity::{mean, variance, weighted_mse};
pub use metrics::{r2_score, rmse};
