pub mod linear_regression;
pub mod regression_tree;

pub use linear_regression::LinearRegression;
pub use regression_tree::RegressionTree;
