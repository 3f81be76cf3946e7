use cupping_core::{mean, utils, variance, weighted_mse, CuppingError, Float, Matrix, Result, Vector};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Number of threshold candidates tried per feature at each node.
const MAX_THRESHOLD_CANDIDATES: usize = 10;

/// Subsets at least this large build their two children on separate rayon tasks.
#[cfg(feature = "parallel")]
const PARALLEL_MIN_SAMPLES: usize = 4096;

/// A node in the regression tree.
///
/// Each node represents either:
/// - **Leaf node**: stores the predicted target value
/// - **Internal node**: stores a split criterion (feature + threshold) and owns both children
#[derive(Debug, Clone)]
enum TreeNode {
    /// Leaf node storing the mean target of the samples that reached it.
    Leaf { value: Float },
    /// Internal node: `feature <= threshold` goes left, everything else right.
    Internal {
        feature_index: usize,
        threshold: Float,
        left_child: Box<TreeNode>,
        right_child: Box<TreeNode>,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Internal {
                left_child,
                right_child,
                ..
            } => 1 + left_child.depth().max(right_child.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Internal {
                left_child,
                right_child,
                ..
            } => left_child.n_leaves() + right_child.n_leaves(),
        }
    }
}

/// Best split found for one node.
struct Split {
    feature: usize,
    threshold: Float,
    left: Vec<usize>,
    right: Vec<usize>,
    score: Float,
}

/// **Regression tree** using greedy recursive variance reduction (CART).
///
/// The tree recursively partitions the feature space using binary splits.
/// Each split is chosen greedily to minimize the **sample-weighted mean
/// squared error** of the two children, i.e. to maximize variance reduction.
///
/// # Algorithm
///
/// **Training** ([`fit`](RegressionTree::fit)):
/// 1. Start with all samples at the root
/// 2. For each node:
///    - If a stopping criterion is met, create a leaf predicting the mean target
///    - Otherwise, for every feature, try up to 10 thresholds placed at evenly
///      spaced ranks of the feature's sorted distinct values
///    - Keep the split with the lowest weighted MSE and credit its variance
///      reduction to the split feature
///    - Partition the samples and recursively build left and right subtrees
/// 3. Normalize the accumulated importances to sum to 1
///
/// **Prediction** ([`predict`](RegressionTree::predict)):
/// - Traverse the tree from the root, going left when `x[feature] <= threshold`
/// - Return the leaf's stored mean
///
/// # Stopping criteria
///
/// - `max_depth`: Maximum tree depth (0 = root only, 1 = one split, etc.)
/// - `min_samples_split`: Minimum samples required to attempt a split
/// - Pure node: every target in the node is identical
/// - No admissible split: no threshold leaves both sides non-empty, or the
///   best split does not reduce the node variance
///
/// # Fields
///
/// - `root`: Root node of the tree (set after fitting)
/// - `max_depth`: Maximum depth
/// - `min_samples_split`: Min samples to allow split
/// - `n_features`: Number of feature columns seen at fit time
/// - `feature_importances`: Normalized variance reduction per feature
///
/// # Errors
///
/// - [`CuppingError::EmptyTrainingData`] if training data empty
/// - [`CuppingError::ShapeMismatch`] if targets length mismatches samples or rows are ragged
/// - [`CuppingError::InvalidValue`] if a non-finite feature or target is encountered
/// - [`CuppingError::NotFitted`] if prediction or importances are requested before fitting
/// - [`CuppingError::FeatureOutOfRange`] if a sample is shorter than a split feature index
#[derive(Debug, Clone)]
pub struct RegressionTree {
    /// Root node of the regression tree.
    root: Option<TreeNode>,
    /// Maximum depth of the tree.
    max_depth: usize,
    /// Minimum samples required to split an internal node.
    min_samples_split: usize,
    /// Number of features (set during fit).
    n_features: usize,
    /// Normalized importances (set during fit).
    feature_importances: Vec<Float>,
    /// Subset size from which child builds run on separate rayon tasks.
    #[cfg(feature = "parallel")]
    parallel_min_samples: usize,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new(12, 20)
    }
}

impl RegressionTree {
    /// Creates a new, unfitted regression tree.
    ///
    /// # Parameters
    ///
    /// - `max_depth`: Maximum depth (e.g., 12). Use smaller for less overfitting.
    /// - `min_samples_split`: Min samples to split (e.g., 20). Higher = fewer splits.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let tree = RegressionTree::new(5, 10);
    /// ```
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            root: None,
            max_depth,
            min_samples_split,
            n_features: 0,
            feature_importances: Vec::new(),
            #[cfg(feature = "parallel")]
            parallel_min_samples: PARALLEL_MIN_SAMPLES,
        }
    }

    /// Creates a leaf predicting the mean of `targets`.
    ///
    /// A pure subset stores its shared value directly so a constant target is
    /// reproduced exactly rather than through a rounded mean.
    fn leaf(targets: &[Float]) -> TreeNode {
        let value = match targets.split_first() {
            Some((&first, rest)) if rest.iter().all(|&t| t == first) => first,
            _ => mean(targets),
        };
        TreeNode::Leaf { value }
    }

    /// Finds the best split for a subset of the data.
    ///
    /// Features are scanned in index order and thresholds in ascending order;
    /// only a strictly lower score replaces the current best, so ties go to
    /// the first candidate found.
    ///
    /// # Returns
    ///
    /// `Some(split)` if at least one threshold leaves both partitions non-empty,
    /// `None` otherwise.
    fn find_best_split(&self, x: &Matrix, y: &[Float], indices: &[usize]) -> Option<Split> {
        let mut best: Option<Split> = None;
        let mut values: Vec<Float> = Vec::with_capacity(indices.len());

        for feature in 0..x.ncols() {
            values.clear();
            values.extend(indices.iter().map(|&i| x[(i, feature)]));
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();

            for threshold in candidate_thresholds(&values) {
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .copied()
                    .partition(|&i| x[(i, feature)] <= threshold);

                if left.is_empty() || right.is_empty() {
                    continue;
                }

                let score = weighted_mse(&gather(y, &left), &gather(y, &right));

                if best.as_ref().map_or(true, |b| score < b.score) {
                    best = Some(Split {
                        feature,
                        threshold,
                        left,
                        right,
                        score,
                    });
                }
            }
        }

        best
    }

    /// Recursively builds the tree.
    ///
    /// # Parameters
    ///
    /// - `x`: Feature matrix
    /// - `y`: Targets
    /// - `indices`: Indices of samples in this node (never empty)
    /// - `depth`: Current depth (0 = root)
    /// - `importances`: Unnormalized variance reduction per feature
    fn build_tree(
        &self,
        x: &Matrix,
        y: &[Float],
        indices: &[usize],
        depth: usize,
        importances: &mut [Float],
    ) -> TreeNode {
        let targets = gather(y, indices);

        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return Self::leaf(&targets);
        }

        let first = targets[0];
        if targets.iter().all(|&t| t == first) {
            return TreeNode::Leaf { value: first };
        }

        let parent_variance = variance(&targets);
        let split = match self.find_best_split(x, y, indices) {
            Some(split) if split.score < parent_variance => split,
            _ => return Self::leaf(&targets),
        };

        importances[split.feature] += parent_variance - split.score;

        let (left_child, right_child) = self.build_children(x, y, &split, depth + 1, importances);

        TreeNode::Internal {
            feature_index: split.feature,
            threshold: split.threshold,
            left_child: Box::new(left_child),
            right_child: Box::new(right_child),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn build_children(
        &self,
        x: &Matrix,
        y: &[Float],
        split: &Split,
        depth: usize,
        importances: &mut [Float],
    ) -> (TreeNode, TreeNode) {
        let left = self.build_tree(x, y, &split.left, depth, importances);
        let right = self.build_tree(x, y, &split.right, depth, importances);
        (left, right)
    }

    /// The right branch accumulates into its own buffer, merged once both
    /// branches are done.
    #[cfg(feature = "parallel")]
    fn build_children(
        &self,
        x: &Matrix,
        y: &[Float],
        split: &Split,
        depth: usize,
        importances: &mut [Float],
    ) -> (TreeNode, TreeNode) {
        if split.left.len() + split.right.len() < self.parallel_min_samples {
            let left = self.build_tree(x, y, &split.left, depth, importances);
            let right = self.build_tree(x, y, &split.right, depth, importances);
            return (left, right);
        }

        let mut right_importances = vec![0.0; importances.len()];
        let (left, right) = rayon::join(
            || self.build_tree(x, y, &split.left, depth, importances),
            || self.build_tree(x, y, &split.right, depth, &mut right_importances),
        );

        for (total, part) in importances.iter_mut().zip(&right_importances) {
            *total += part;
        }

        (left, right)
    }

    /// Fits the regression tree on training data.
    ///
    /// # Parameters
    ///
    /// - `x`: Feature matrix of shape `(n_samples, n_features)`
    /// - `y`: Targets of length `n_samples`
    ///
    /// # Returns
    ///
    /// `Ok(())` on success, replacing any previously fitted tree and importances.
    /// On error the previous fitted state is left untouched.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::EmptyTrainingData`] if `x` has zero rows
    /// - [`CuppingError::ShapeMismatch`] if `y.len() != x.nrows()` or `x` has no columns
    /// - [`CuppingError::InvalidValue`] if `x` or `y` contains NaN or infinity, or if the
    ///   target spread is so large that the variance overflows
    ///
    /// # Complexity
    ///
    /// Let `n = n_samples`, `d = n_features`, `h = tree height`.
    /// - Time: `O(d * n * log(n) * h)` (sorting distinct values per node, 10 partitions per feature)
    /// - Space: `O(n + h)` for index partitions and recursion
    pub fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        let n = x.nrows();
        let d = x.ncols();

        if n == 0 {
            return Err(CuppingError::EmptyTrainingData);
        }

        if y.len() != n {
            return Err(CuppingError::ShapeMismatch {
                expected: format!("Expected {} targets", n),
                got: format!("Got {} targets", y.len()),
            });
        }

        if d == 0 {
            return Err(CuppingError::ShapeMismatch {
                expected: "At least 1 feature column".into(),
                got: "0 feature columns".into(),
            });
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(CuppingError::InvalidValue {
                message: "Non-finite value encountered in feature values".into(),
            });
        }

        if y.iter().any(|v| !v.is_finite()) {
            return Err(CuppingError::InvalidValue {
                message: "Non-finite value encountered in targets".into(),
            });
        }

        let mut importances = vec![0.0; d];
        let all_indices: Vec<usize> = (0..n).collect();
        let root = self.build_tree(x, y.as_slice(), &all_indices, 0, &mut importances);

        let total: Float = importances.iter().sum();
        if !total.is_finite() {
            return Err(CuppingError::InvalidValue {
                message: "Target spread overflows the variance computation".into(),
            });
        }
        if total > 0.0 {
            for v in importances.iter_mut() {
                *v /= total;
            }
        }

        debug!(
            samples = n,
            features = d,
            depth = root.depth(),
            leaves = root.n_leaves(),
            "fitted regression tree"
        );

        self.root = Some(root);
        self.n_features = d;
        self.feature_importances = importances;

        Ok(())
    }

    /// Fits the tree on row-major data.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::ShapeMismatch`] if rows are ragged
    /// - Everything [`fit`](RegressionTree::fit) reports
    pub fn fit_rows(&mut self, rows: &[Vec<Float>], targets: &[Float]) -> Result<()> {
        let x = utils::matrix_from_rows(rows)?;
        let y = Vector::from_column_slice(targets);
        self.fit(&x, &y)
    }

    /// Walks from `node` down to a leaf for a single sample.
    fn predict_node(&self, x_row: &[Float], node: &TreeNode) -> Result<Float> {
        match node {
            TreeNode::Leaf { value } => Ok(*value),
            TreeNode::Internal {
                feature_index,
                threshold,
                left_child,
                right_child,
            } => {
                let val = *x_row.get(*feature_index).ok_or(CuppingError::FeatureOutOfRange {
                    index: *feature_index,
                    len: x_row.len(),
                })?;

                if val <= *threshold {
                    self.predict_node(x_row, left_child)
                } else {
                    self.predict_node(x_row, right_child)
                }
            }
        }
    }

    /// Predicts the target for a single sample.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::NotFitted`] if tree not fitted
    /// - [`CuppingError::FeatureOutOfRange`] if the traversal needs a feature the sample lacks
    pub fn predict_one(&self, sample: &[Float]) -> Result<Float> {
        let root = self.root.as_ref().ok_or(CuppingError::NotFitted)?;
        self.predict_node(sample, root)
    }

    /// Predicts targets for input matrix `x`.
    ///
    /// # Parameters
    ///
    /// - `x`: Query matrix of shape `(n_queries, n_features)`
    ///
    /// # Returns
    ///
    /// Vector of predictions of length `n_queries`, in row order.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::NotFitted`] if tree not fitted
    /// - [`CuppingError::FeatureOutOfRange`] if `x` has too few columns for a visited split
    ///
    /// # Complexity
    ///
    /// Let `n = n_queries`, `h = tree height`.
    /// - Time: `O(n * h)` (traverse tree for each query)
    /// - Space: `O(n)` for output
    pub fn predict(&self, x: &Matrix) -> Result<Vector> {
        let root = self.root.as_ref().ok_or(CuppingError::NotFitted)?;

        let n = x.nrows();
        let mut predictions = vec![0.0; n];

        #[cfg(feature = "parallel")]
        {
            predictions
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(i, pred)| {
                    let row = utils::row_to_vec(x, i);
                    *pred = self.predict_node(&row, root)?;
                    Ok::<(), CuppingError>(())
                })?;
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (i, pred) in predictions.iter_mut().enumerate() {
                let row = utils::row_to_vec(x, i);
                *pred = self.predict_node(&row, root)?;
            }
        }

        Ok(Vector::from_vec(predictions))
    }

    /// Predicts targets for row-major samples, preserving their order.
    ///
    /// # Errors
    ///
    /// Same as [`predict_one`](RegressionTree::predict_one).
    pub fn predict_rows(&self, rows: &[Vec<Float>]) -> Result<Vec<Float>> {
        let root = self.root.as_ref().ok_or(CuppingError::NotFitted)?;

        #[cfg(feature = "parallel")]
        let predictions = rows
            .par_iter()
            .map(|row| self.predict_node(row, root))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let predictions = rows.iter().map(|row| self.predict_node(row, root)).collect();

        predictions
    }

    /// Returns the normalized feature importances from the last fit.
    ///
    /// One entry per feature column seen at fit time; entries sum to 1, or
    /// are all zero when the tree is a single leaf.
    ///
    /// # Errors
    ///
    /// - [`CuppingError::NotFitted`] if tree not fitted
    pub fn feature_importances(&self) -> Result<&[Float]> {
        if self.root.is_none() {
            return Err(CuppingError::NotFitted);
        }
        Ok(&self.feature_importances)
    }

    /// Returns the maximum depth parameter.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the minimum samples split parameter.
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Returns the number of features (set after fitting).
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Returns `true` once a fit has succeeded.
    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Length of the longest root-to-leaf path in edges, `None` before fit.
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    /// Number of leaves, `None` before fit.
    pub fn n_leaves(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::n_leaves)
    }
}

fn gather(y: &[Float], indices: &[usize]) -> Vec<Float> {
    indices.iter().map(|&i| y[i]).collect()
}

/// Midpoint thresholds at up to [`MAX_THRESHOLD_CANDIDATES`] evenly spaced
/// ranks of `distinct`, which must be sorted ascending without duplicates.
///
/// With `M` distinct values, rank `r_j = floor(j * (M - 1) / 11)` for
/// `j = 1..=10` yields the threshold `(v[r_j] + v[r_j + 1]) / 2`. Repeated
/// ranks are emitted once.
fn candidate_thresholds(distinct: &[Float]) -> Vec<Float> {
    let m = distinct.len();
    if m < 2 {
        return Vec::new();
    }

    let mut thresholds = Vec::with_capacity(MAX_THRESHOLD_CANDIDATES);
    let mut last_rank = None;

    for j in 1..=MAX_THRESHOLD_CANDIDATES {
        let rank = (j * (m - 1) / (MAX_THRESHOLD_CANDIDATES + 1)).min(m - 2);
        if last_rank == Some(rank) {
            continue;
        }
        last_rank = Some(rank);
        thresholds.push(0.5 * (distinct[rank] + distinct[rank + 1]));
    }

    thresholds
}
