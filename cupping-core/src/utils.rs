use crate::{CuppingError, Float, Matrix, Result, Vector};

/// Builds a sample-major [`Matrix`] from row-major input.
///
/// Every row must have the same length as the first one.
///
/// # Errors
///
/// - [`CuppingError::EmptyTrainingData`] if `rows` is empty
/// - [`CuppingError::ShapeMismatch`] if any row is ragged
pub fn matrix_from_rows(rows: &[Vec<Float>]) -> Result<Matrix> {
    let first = rows.first().ok_or(CuppingError::EmptyTrainingData)?;
    let cols = first.len();

    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
        return Err(CuppingError::ShapeMismatch {
            expected: format!("Expected {} columns in every row", cols),
            got: format!("Row {} has {} columns", i, row.len()),
        });
    }

    Ok(Matrix::from_fn(rows.len(), cols, |i, j| rows[i][j]))
}

/// Copies row `i` of `x` into a contiguous buffer.
pub fn row_to_vec(x: &Matrix, i: usize) -> Vec<Float> {
    x.row(i).iter().copied().collect()
}

/// Selects the rows listed in `indices`, in that order.
pub fn select_rows(x: &Matrix, indices: &[usize]) -> Matrix {
    Matrix::from_fn(indices.len(), x.ncols(), |i, j| x[(indices[i], j)])
}

/// Selects the entries listed in `indices`, in that order.
pub fn select_entries(y: &Vector, indices: &[usize]) -> Vector {
    Vector::from_iterator(indices.len(), indices.iter().map(|&i| y[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_from_rows_layout() {
        let m = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m[(2, 0)], 5.0);
        assert_eq!(row_to_vec(&m, 1), vec![3.0, 4.0]);
    }

    #[test]
    fn test_matrix_from_rows_empty() {
        let result = matrix_from_rows(&[]);
        assert!(matches!(result, Err(CuppingError::EmptyTrainingData)));
    }

    #[test]
    fn test_matrix_from_rows_ragged() {
        let result = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(result, Err(CuppingError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_select_rows_and_entries() {
        let m = matrix_from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = Vector::from_vec(vec![10.0, 20.0, 30.0]);

        let sub = select_rows(&m, &[2, 0]);
        assert_eq!(sub[(0, 0)], 3.0);
        assert_eq!(sub[(1, 0)], 1.0);

        let ys = select_entries(&y, &[2, 0]);
        assert_eq!(ys.as_slice(), &[30.0, 10.0]);
    }
}
