use crate::Float;

/// Arithmetic mean of `values`.
///
/// Returns `0.0` for an empty slice so callers never divide by zero.
pub fn mean(values: &[Float]) -> Float {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<Float>() / values.len() as Float
}

/// Computes the **population variance** of a set of regression targets.
///
/// Variance is the impurity measure of a regression tree node: it is the
/// mean squared error obtained when every sample in the node is predicted
/// by the node mean.
///
/// # Definition
///
/// For values `v_1 .. v_n` with mean `μ`:
///
/// ```text
/// Var = (1/n) Σ_i (v_i − μ)²
/// ```
///
/// The divisor is `n`, not `n − 1` (no Bessel correction).
///
/// - `Var = 0` indicates a **pure** node (all targets identical)
/// - Larger values indicate more spread around the node mean
///
/// # Returns
///
/// - The variance as a non-negative floating-point value.
/// - Returns `0.0` for an empty slice.
///
/// # Examples
///
/// ```rust
/// use cupping_core::impurity::variance;
///
/// let v = variance(&[1.0, 1.0, 9.0, 9.0]);
///
/// assert!((v - 16.0).abs() < 1e-12);
/// ```
///
/// # Notes
///
/// - Uses the two-pass formulation (mean first, then squared deviations),
///   which avoids the cancellation of the `E[x²] − E[x]²` shortcut.
pub fn variance(values: &[Float]) -> Float {
    if values.is_empty() {
        return 0.0;
    }

    let m = mean(values);
    let sum_sq: Float = values.iter().map(|&v| (v - m) * (v - m)).sum();

    sum_sq / values.len() as Float
}

/// Sample-weighted mean squared error of a binary partition.
///
/// ```text
/// (|L| / n) · Var(L) + (|R| / n) · Var(R),   n = |L| + |R|
/// ```
///
/// This is the score minimised by the regression tree split search; lower
/// is better. Returns `0.0` when both sides are empty.
pub fn weighted_mse(left: &[Float], right: &[Float]) -> Float {
    let n = left.len() + right.len();
    if n == 0 {
        return 0.0;
    }

    let n_f = n as Float;
    let w_l = left.len() as Float / n_f;
    let w_r = right.len() as Float / n_f;

    w_l * variance(left) + w_r * variance(right)
}
