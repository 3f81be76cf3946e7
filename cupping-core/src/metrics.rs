use crate::{CuppingError, Float, Result};

fn check_pair(actual: &[Float], predicted: &[Float]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(CuppingError::ShapeMismatch {
            expected: format!("Expected {} predictions", actual.len()),
            got: format!("Got {}", predicted.len()),
        });
    }
    if actual.is_empty() {
        return Err(CuppingError::EmptyTrainingData);
    }
    Ok(())
}

/// Root mean squared error between `actual` and `predicted`.
///
/// # Errors
///
/// - [`CuppingError::ShapeMismatch`] if the slices differ in length
/// - [`CuppingError::EmptyTrainingData`] if both are empty
pub fn rmse(actual: &[Float], predicted: &[Float]) -> Result<Float> {
    check_pair(actual, predicted)?;

    let sq: Float = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();

    Ok((sq / actual.len() as Float).sqrt())
}

/// Coefficient of determination `R² = 1 − SS_res / SS_tot`.
///
/// When `actual` has zero variance `SS_tot` is zero and the ratio is
/// undefined; the score is then `1.0` for a perfect fit and `0.0` otherwise.
///
/// # Errors
///
/// Same as [`rmse`].
pub fn r2_score(actual: &[Float], predicted: &[Float]) -> Result<Float> {
    check_pair(actual, predicted)?;

    let mean = crate::mean(actual);
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (a, p) in actual.iter().zip(predicted) {
        ss_res += (a - p) * (a - p);
        ss_tot += (a - mean) * (a - mean);
    }

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}
