use cupping_core::{utils, CuppingError, Float, Matrix, Result, Vector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Train and test partitions produced by [`train_test_split`].
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Matrix,
    pub y_train: Vector,
    pub x_test: Matrix,
    pub y_test: Vector,
}

/// Shuffles the rows of `(x, y)` and splits them into train and test sets.
///
/// The first `floor(train_fraction * n)` shuffled rows form the training
/// set, the rest the test set. With a `seed` the shuffle is reproducible;
/// without one the generator is seeded from the operating system.
///
/// # Errors
///
/// - [`CuppingError::ShapeMismatch`] if `y.len() != x.nrows()`
/// - [`CuppingError::InvalidHyperparameter`] if `train_fraction` is not in `(0, 1]`
pub fn train_test_split(
    x: &Matrix,
    y: &Vector,
    train_fraction: Float,
    seed: Option<u64>,
) -> Result<TrainTestSplit> {
    let n = x.nrows();

    if y.len() != n {
        return Err(CuppingError::ShapeMismatch {
            expected: format!("Expected {} targets", n),
            got: format!("Got {}", y.len()),
        });
    }

    if !(train_fraction > 0.0 && train_fraction <= 1.0) {
        return Err(CuppingError::InvalidHyperparameter {
            name: "train_fraction".into(),
            value: train_fraction.to_string(),
        });
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let n_train = (train_fraction * n as Float) as usize;
    let (train, test) = indices.split_at(n_train.min(n));

    debug!(train = train.len(), test = test.len(), "split dataset");

    Ok(TrainTestSplit {
        x_train: utils::select_rows(x, train),
        y_train: utils::select_entries(y, train),
        x_test: utils::select_rows(x, test),
        y_test: utils::select_entries(y, test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Matrix, Vector) {
        let x = Matrix::from_fn(n, 2, |i, j| (i * 10 + j) as f64);
        let y = Vector::from_iterator(n, (0..n).map(|i| i as f64));
        (x, y)
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = data(10);
        let split = train_test_split(&x, &y, 0.8, Some(7)).unwrap();
        assert_eq!(split.x_train.nrows(), 8);
        assert_eq!(split.y_train.len(), 8);
        assert_eq!(split.x_test.nrows(), 2);
        assert_eq!(split.y_test.len(), 2);
        assert_eq!(split.x_test.ncols(), 2);
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let (x, y) = data(25);
        let split = train_test_split(&x, &y, 0.6, Some(3)).unwrap();
        for i in 0..split.x_train.nrows() {
            assert_eq!(split.x_train[(i, 0)], split.y_train[i] * 10.0);
        }
        for i in 0..split.x_test.nrows() {
            assert_eq!(split.x_test[(i, 1)], split.y_test[i] * 10.0 + 1.0);
        }
    }

    #[test]
    fn test_split_is_a_partition() {
        let (x, y) = data(30);
        let split = train_test_split(&x, &y, 0.5, Some(11)).unwrap();
        let mut seen: Vec<f64> = split.y_train.iter().chain(split.y_test.iter()).copied().collect();
        seen.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(seen, y.as_slice());
    }

    #[test]
    fn test_split_seed_is_reproducible() {
        let (x, y) = data(50);
        let a = train_test_split(&x, &y, 0.8, Some(42)).unwrap();
        let b = train_test_split(&x, &y, 0.8, Some(42)).unwrap();
        assert_eq!(a.y_train, b.y_train);
        assert_eq!(a.y_test, b.y_test);
    }

    #[test]
    fn test_split_full_fraction_leaves_empty_test() {
        let (x, y) = data(5);
        let split = train_test_split(&x, &y, 1.0, Some(1)).unwrap();
        assert_eq!(split.x_train.nrows(), 5);
        assert_eq!(split.x_test.nrows(), 0);
    }

    #[test]
    fn test_split_invalid_fraction() {
        let (x, y) = data(5);
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                train_test_split(&x, &y, fraction, None),
                Err(CuppingError::InvalidHyperparameter { .. })
            ));
        }
    }

    #[test]
    fn test_split_target_mismatch() {
        let (x, _) = data(5);
        let y = Vector::zeros(4);
        assert!(matches!(
            train_test_split(&x, &y, 0.8, None),
            Err(CuppingError::ShapeMismatch { .. })
        ));
    }
}
