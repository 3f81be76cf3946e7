use cupping_core::{CuppingError, Float, Matrix, Result, Vector};
use tracing::debug;

/// Iterations between progress log lines during training.
const LOG_EVERY: usize = 500;

/// **Linear regression** for a single continuous target, trained by batch
/// gradient descent on the mean squared error.
///
/// This model fits parameters `(w, b)` for the affine predictor:
///
/// ```text
/// ŷ = X w + b
/// ```
///
/// where:
/// - `X` is an `(n × d)` design matrix (n samples, d features)
/// - `w` is a `(d × 1)` weight vector
/// - `b` is a scalar bias (intercept)
///
/// # Training objective
///
/// ```text
/// MSE(w, b) = (1/n) ||X w + b·1 - y||²₂
/// ```
///
/// Each iteration computes the residuals `e = X w + b - y` and the gradients
///
/// ```text
/// ∇w = (2/n) Xᵀ e
/// ∇b = (2/n) Σ_i e_i
/// ```
///
/// then steps `w ← w - α ∇w`, `b ← b - α ∇b`.
///
/// # Convergence
///
/// From the second iteration on, training stops as soon as either
/// - `|MSE_t - MSE_{t-1}| < mse_tolerance`, or
/// - `||∇w||₂ < gradient_tolerance`,
///
/// otherwise after `max_iter` iterations.
///
/// # Numerical notes
///
/// - Gradient descent is sensitive to feature scale; a learning rate that is
///   too large makes the MSE blow up. A non-finite MSE aborts training.
/// - Weights start at zero, so training is deterministic.
///
/// # Errors
///
/// - [`CuppingError::EmptyTrainingData`] if `X` has zero rows.
/// - [`CuppingError::ShapeMismatch`] if `y.len() != X.nrows()` or prediction shapes mismatch.
/// - [`CuppingError::InvalidHyperparameter`] if the learning rate or iteration budget is invalid.
/// - [`CuppingError::InvalidValue`] if training diverges.
/// - [`CuppingError::NotFitted`] if [`predict`](LinearRegression::predict) is called before fit.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    /// Intercept term `b` in `ŷ = Xw + b`.
    bias: Float,

    /// Weight vector `w` of shape `(d × 1)`.
    ///
    /// `None` indicates the model is not fitted yet.
    weights: Option<Vector>,

    /// Step size `α`.
    learning_rate: Float,

    /// Maximum number of gradient steps.
    max_iter: usize,

    mse_tolerance: Float,
    gradient_tolerance: Float,

    /// Iterations run by the last fit.
    n_iter: usize,

    /// Training RMSE reached by the last fit.
    train_rmse: Float,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new(0.01, 10_000)
    }
}

impl LinearRegression {
    /// Creates a new, unfitted [`LinearRegression`] model.
    ///
    /// # Parameters
    ///
    /// - `learning_rate`: Gradient step size `α` (must be finite and > 0).
    /// - `max_iter`: Maximum number of iterations (must be > 0).
    ///
    /// Hyper-parameters are validated by [`fit`](LinearRegression::fit).
    pub fn new(learning_rate: Float, max_iter: usize) -> Self {
        Self {
            bias: 0.0,
            weights: None,
            learning_rate,
            max_iter,
            mse_tolerance: 1e-6,
            gradient_tolerance: 1e-4,
            n_iter: 0,
            train_rmse: 0.0,
        }
    }

    /// Overrides the convergence tolerances (defaults: `1e-6` on the MSE
    /// change, `1e-4` on the gradient norm).
    pub fn with_tolerances(mut self, mse_tolerance: Float, gradient_tolerance: Float) -> Self {
        self.mse_tolerance = mse_tolerance;
        self.gradient_tolerance = gradient_tolerance;
        self
    }

    fn validate_hyperparameters(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CuppingError::InvalidHyperparameter {
                name: "learning_rate".into(),
                value: self.learning_rate.to_string(),
            });
        }
        if self.max_iter == 0 {
            return Err(CuppingError::InvalidHyperparameter {
                name: "max_iter".into(),
                value: self.max_iter.to_string(),
            });
        }
        Ok(())
    }

    /// Fits the model parameters `(w, b)` on training data `x` and targets `y`.
    ///
    /// # Returns
    ///
    /// - `Ok(())` on success, storing `weights` and `bias` in the struct.
    ///   A failed fit leaves the previous parameters in place.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::EmptyTrainingData`] if `x.nrows() == 0`.
    /// - [`CuppingError::ShapeMismatch`] if `y.len() != x.nrows()`.
    /// - [`CuppingError::InvalidHyperparameter`] for a bad learning rate or `max_iter`.
    /// - [`CuppingError::InvalidValue`] if the MSE becomes non-finite.
    ///
    /// # Complexity
    ///
    /// Let `n = nrows`, `d = ncols`, `T = iterations run`:
    /// - Time: `O(T n d)` (two matrix-vector products per iteration)
    /// - Memory: `O(n + d)`
    pub fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        self.validate_hyperparameters()?;

        let n = x.nrows();
        let d = x.ncols();

        if n == 0 {
            return Err(CuppingError::EmptyTrainingData);
        }
        if y.len() != n {
            return Err(CuppingError::ShapeMismatch {
                expected: format!("Expected {} targets", n),
                got: format!("Got {}", y.len()),
            });
        }

        let n_f = n as Float;
        let alpha = self.learning_rate;

        let mut w = Vector::zeros(d);
        let mut b: Float = 0.0;
        let mut prev_mse = Float::MAX;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            // --- Residuals e = Xw + b - y ---
            let mut errors = x * &w;
            errors.add_scalar_mut(b);
            errors -= y;

            let mse = errors.norm_squared() / n_f;
            if !mse.is_finite() {
                return Err(CuppingError::InvalidValue {
                    message: format!(
                        "Gradient descent diverged at iteration {} (learning_rate = {})",
                        iter, alpha
                    ),
                });
            }

            // --- Gradients ∇w = (2/n) Xᵀ e, ∇b = (2/n) Σ e ---
            let grad_w = x.tr_mul(&errors) * (2.0 / n_f);
            let grad_b = 2.0 * errors.sum() / n_f;

            if iter > 0
                && ((mse - prev_mse).abs() < self.mse_tolerance
                    || grad_w.norm() < self.gradient_tolerance)
            {
                debug!(iteration = iter, rmse = mse.sqrt(), "gradient descent converged");
                break;
            }

            w.axpy(-alpha, &grad_w, 1.0);
            b -= alpha * grad_b;
            prev_mse = mse;

            if iter % LOG_EVERY == 0 {
                debug!(iteration = iter, rmse = mse.sqrt(), "gradient descent progress");
            }
        }

        self.weights = Some(w);
        self.bias = b;
        self.n_iter = iterations;
        self.train_rmse = prev_mse.sqrt();

        debug!(
            samples = n,
            features = d,
            iterations,
            rmse = self.train_rmse,
            "fitted linear regression"
        );

        Ok(())
    }

    /// Predicts targets for input matrix `x` using the learned parameters.
    ///
    /// Computes:
    ///
    /// ```text
    /// ŷ = X w + b
    /// ```
    ///
    /// # Errors
    ///
    /// - [`CuppingError::NotFitted`] if the model has not been trained.
    /// - [`CuppingError::ShapeMismatch`] if `x.ncols() != w.nrows()`.
    pub fn predict(&self, x: &Matrix) -> Result<Vector> {
        let w = self.weights.as_ref().ok_or(CuppingError::NotFitted)?;

        if x.ncols() != w.nrows() {
            return Err(CuppingError::ShapeMismatch {
                expected: format!("Expected {} features", w.nrows()),
                got: format!("Got {}", x.ncols()),
            });
        }

        let mut preds = x * w;
        preds.add_scalar_mut(self.bias);
        Ok(preds)
    }

    /// Learned weights, one per feature column.
    pub fn weights(&self) -> Result<&Vector> {
        self.weights.as_ref().ok_or(CuppingError::NotFitted)
    }

    pub fn bias(&self) -> Float {
        self.bias
    }

    pub fn learning_rate(&self) -> Float {
        self.learning_rate
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Iterations run by the last successful fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Training RMSE of the last parameters that were stepped from, i.e. the
    /// MSE of the iteration before convergence was detected.
    pub fn train_rmse(&self) -> Float {
        self.train_rmse
    }
}
