use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use cupping_core::{utils, CuppingError, Float, Matrix, Result, Vector};
use tracing::{debug, warn};

/// Sensory score columns used as features by default.
pub const DEFAULT_FEATURE_COLUMNS: [&str; 8] = [
    "Data.Scores.Aroma",
    "Data.Scores.Aftertaste",
    "Data.Scores.Acidity",
    "Data.Scores.Body",
    "Data.Scores.Balance",
    "Data.Scores.Uniformity",
    "Data.Scores.Sweetness",
    "Data.Scores.Moisture",
];

/// Column predicted by default.
pub const DEFAULT_TARGET_COLUMN: &str = "Data.Scores.Flavor";

/// Feature matrix and aligned targets loaded from a CSV file.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Matrix,
    pub targets: Vector,
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// Rows dropped because a selected cell was missing or empty.
    pub skipped_rows: usize,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

/// Loads `feature_columns` and `target_column` from the CSV file at `path`.
///
/// See [`read_csv`] for the row selection rules.
pub fn load_csv<P, S>(path: P, feature_columns: &[S], target_column: &str) -> Result<Dataset>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| CuppingError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), "reading csv");
    read_csv(BufReader::new(file), feature_columns, target_column)
}

/// Reads a headed CSV stream, selecting columns by exact header name.
///
/// Rows that are too short to contain every selected column, or where any
/// selected cell is empty, are skipped. Everything else must parse as a
/// number.
///
/// # Errors
///
/// - [`CuppingError::Csv`] if the stream is not valid CSV
/// - [`CuppingError::MissingColumn`] if a requested column is not in the header
/// - [`CuppingError::InvalidValue`] if a selected cell is not numeric
/// - [`CuppingError::EmptyTrainingData`] if no row survives
pub fn read_csv<R, S>(reader: R, feature_columns: &[S], target_column: &str) -> Result<Dataset>
where
    R: Read,
    S: AsRef<str>,
{
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| CuppingError::Csv(e.to_string()))?
        .clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| CuppingError::MissingColumn(name.to_string()))
    };

    let feature_idx = feature_columns
        .iter()
        .map(|c| column_index(c.as_ref()))
        .collect::<Result<Vec<usize>>>()?;
    let target_idx = column_index(target_column)?;

    let mut rows: Vec<Vec<Float>> = Vec::new();
    let mut targets: Vec<Float> = Vec::new();
    let mut skipped = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CuppingError::Csv(e.to_string()))?;
        // header is line 1
        let line = i + 2;

        let cell = |idx: usize| record.get(idx).map(str::trim).filter(|c| !c.is_empty());

        let Some(target_cell) = cell(target_idx) else {
            skipped += 1;
            continue;
        };
        let feature_cells: Option<Vec<&str>> = feature_idx.iter().map(|&idx| cell(idx)).collect();
        let Some(feature_cells) = feature_cells else {
            skipped += 1;
            continue;
        };

        let parse = |value: &str, column: &str| {
            value.parse::<Float>().map_err(|_| CuppingError::InvalidValue {
                message: format!("line {}: column '{}' has non-numeric value '{}'", line, column, value),
            })
        };

        let row = feature_cells
            .iter()
            .zip(feature_columns)
            .map(|(value, column)| parse(*value, column.as_ref()))
            .collect::<Result<Vec<Float>>>()?;

        targets.push(parse(target_cell, target_column)?);
        rows.push(row);
    }

    if skipped > 0 {
        warn!(skipped, "skipped rows with missing or empty cells");
    }

    if rows.is_empty() {
        return Err(CuppingError::EmptyTrainingData);
    }

    let features = utils::matrix_from_rows(&rows)?;

    debug!(samples = rows.len(), features = feature_idx.len(), "loaded dataset");

    Ok(Dataset {
        features,
        targets: Vector::from_vec(targets),
        feature_names: feature_columns.iter().map(|c| c.as_ref().to_string()).collect(),
        target_name: target_column.to_string(),
        skipped_rows: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Location.Region,Data.Scores.Aroma,Data.Scores.Flavor,Data.Scores.Body
north,7.5,8.0,6.25
south,,7.0,6.0
east,6.0,6.5,5.5
west,9.0,,7.0
";

    #[test]
    fn test_read_csv_selects_columns_by_name() {
        let data = read_csv(
            SAMPLE.as_bytes(),
            &["Data.Scores.Body", "Data.Scores.Aroma"],
            "Data.Scores.Flavor",
        )
        .unwrap();

        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.features[(0, 0)], 6.25);
        assert_eq!(data.features[(0, 1)], 7.5);
        assert_eq!(data.features[(1, 1)], 6.0);
        assert_eq!(data.targets.as_slice(), &[8.0, 6.5]);
        assert_eq!(data.feature_names, vec!["Data.Scores.Body", "Data.Scores.Aroma"]);
        assert_eq!(data.skipped_rows, 2);
    }

    #[test]
    fn test_read_csv_skips_short_rows() {
        let csv = "a,b,y\n1,2,3\n4,5\n6,7,8\n";
        let data = read_csv(csv.as_bytes(), &["a", "b"], "y").unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.targets.as_slice(), &[3.0, 8.0]);
    }

    #[test]
    fn test_read_csv_missing_column() {
        let result = read_csv(SAMPLE.as_bytes(), &["Data.Scores.Acidity"], "Data.Scores.Flavor");
        assert!(matches!(result, Err(CuppingError::MissingColumn(ref c)) if c == "Data.Scores.Acidity"));
    }

    #[test]
    fn test_read_csv_non_numeric_value() {
        let csv = "a,y\n1,2\nabc,3\n";
        let result = read_csv(csv.as_bytes(), &["a"], "y");
        assert!(matches!(result, Err(CuppingError::InvalidValue { ref message }) if message.contains("line 3")));
    }

    #[test]
    fn test_read_csv_no_usable_rows() {
        let csv = "a,y\n,2\n1,\n";
        let result = read_csv(csv.as_bytes(), &["a"], "y");
        assert!(matches!(result, Err(CuppingError::EmptyTrainingData)));
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let data = load_csv(file.path(), &["Data.Scores.Aroma"], DEFAULT_TARGET_COLUMN).unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.target_name, DEFAULT_TARGET_COLUMN);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = load_csv("/definitely/not/here.csv", &DEFAULT_FEATURE_COLUMNS, DEFAULT_TARGET_COLUMN);
        assert!(matches!(result, Err(CuppingError::Io(_))));
    }
}
