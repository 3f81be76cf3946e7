use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use cupping_core::{r2_score, rmse, CuppingError, Float, Result};

#[cfg(feature = "serde")]
use serde::Serialize;

/// RMSE and R² of one set of predictions.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub samples: usize,
    pub rmse: Float,
    pub r2: Float,
}

impl Scores {
    pub fn compute(actual: &[Float], predicted: &[Float]) -> Result<Self> {
        Ok(Self {
            samples: actual.len(),
            rmse: rmse(actual, predicted)?,
            r2: r2_score(actual, predicted)?,
        })
    }
}

/// Per-feature value reported after training: an importance for the tree,
/// a weight for the linear model.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScore {
    pub feature: String,
    pub value: Float,
}

/// Summary of one training run.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub model: String,
    /// Hyper-parameters as `(name, value)` pairs, in display order.
    pub params: Vec<(String, String)>,
    pub train: Scores,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub test: Option<Scores>,
    /// What `features[..].value` means ("importance" or "weight").
    pub feature_value: String,
    pub features: Vec<FeatureScore>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub bias: Option<Float>,
}

impl EvaluationReport {
    /// Builds a report from train predictions, optional test predictions and
    /// one value per feature.
    ///
    /// An empty test set yields `test: None`.
    pub fn new(
        model: &str,
        train: (&[Float], &[Float]),
        test: (&[Float], &[Float]),
        feature_value: &str,
        feature_names: &[String],
        values: &[Float],
    ) -> Result<Self> {
        if feature_names.len() != values.len() {
            return Err(CuppingError::ShapeMismatch {
                expected: format!("Expected {} feature values", feature_names.len()),
                got: format!("Got {}", values.len()),
            });
        }

        let test = if test.0.is_empty() {
            None
        } else {
            Some(Scores::compute(test.0, test.1)?)
        };

        Ok(Self {
            model: model.to_string(),
            params: Vec::new(),
            train: Scores::compute(train.0, train.1)?,
            test,
            feature_value: feature_value.to_string(),
            features: feature_names
                .iter()
                .zip(values)
                .map(|(feature, &value)| FeatureScore {
                    feature: feature.clone(),
                    value,
                })
                .collect(),
            bias: None,
        })
    }

    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_bias(mut self, bias: Float) -> Self {
        self.bias = Some(bias);
        self
    }

    /// Serializes the report as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CuppingError::InvalidValue {
            message: format!("Failed to serialize report: {}", e),
        })
    }

    #[cfg(not(feature = "serde"))]
    pub fn to_json(&self) -> Result<String> {
        Err(CuppingError::FeatureDisabled("serde"))
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        writeln!(f, "Model: {} ({})", self.model, params.join(", "))?;

        writeln!(
            f,
            "Train RMSE={:.4}, R2={:.4} (n={})",
            self.train.rmse, self.train.r2, self.train.samples
        )?;
        if let Some(test) = &self.test {
            writeln!(
                f,
                "Test  RMSE={:.4}, R2={:.4} (n={})",
                test.rmse, test.r2, test.samples
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Feature {}s:", self.feature_value)?;
        let width = self.features.iter().map(|s| s.feature.len()).max().unwrap_or(0);
        for score in &self.features {
            writeln!(f, "  {:<width$}  {:>10.6}", score.feature, score.value, width = width)?;
        }

        if let Some(bias) = self.bias {
            writeln!(f, "  {:<width$}  {:>10.6}", "bias", bias, width = width)?;
        }

        Ok(())
    }
}

/// Writes `Predicted,Actual` rows.
pub fn write_predictions<W: Write>(writer: W, actual: &[Float], predicted: &[Float]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(CuppingError::ShapeMismatch {
            expected: format!("Expected {} predictions", actual.len()),
            got: format!("Got {}", predicted.len()),
        });
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Predicted", "Actual"])
        .map_err(|e| CuppingError::Csv(e.to_string()))?;
    for (p, a) in predicted.iter().zip(actual) {
        wtr.write_record([p.to_string(), a.to_string()])
            .map_err(|e| CuppingError::Csv(e.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one value per line without a header.
pub fn write_values<W: Write>(mut writer: W, values: &[Float]) -> Result<()> {
    for v in values {
        writeln!(writer, "{}", v)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_predictions_file<P: AsRef<Path>>(path: P, actual: &[Float], predicted: &[Float]) -> Result<()> {
    let file = create(path.as_ref())?;
    write_predictions(file, actual, predicted)
}

pub fn write_values_file<P: AsRef<Path>>(path: P, values: &[Float]) -> Result<()> {
    let file = create(path.as_ref())?;
    write_values(file, values)
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| CuppingError::Io(format!("Failed to create {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["Data.Scores.Aroma".to_string(), "Data.Scores.Body".to_string()]
    }

    fn report() -> EvaluationReport {
        EvaluationReport::new(
            "regression_tree",
            (&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]),
            (&[], &[]),
            "importance",
            &names(),
            &[0.75, 0.25],
        )
        .unwrap()
        .with_param("max_depth", 12)
    }

    #[test]
    fn test_report_scores() {
        let r = report();
        assert_eq!(r.train.samples, 3);
        assert!((r.train.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(r.test.is_none());
        assert_eq!(r.features[0].feature, "Data.Scores.Aroma");
        assert_eq!(r.features[1].value, 0.25);
    }

    #[test]
    fn test_report_feature_count_mismatch() {
        let result = EvaluationReport::new(
            "linear_regression",
            (&[1.0], &[1.0]),
            (&[], &[]),
            "weight",
            &names(),
            &[0.5],
        );
        assert!(matches!(result, Err(CuppingError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_report_display() {
        let text = report().with_bias(0.5).to_string();
        assert!(text.contains("Model: regression_tree (max_depth=12)"));
        assert!(text.contains("Train RMSE="));
        assert!(!text.contains("Test  RMSE="));
        assert!(text.contains("Feature importances:"));
        assert!(text.contains("Data.Scores.Body"));
        assert!(text.contains("bias"));
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_report_json() {
        let json = report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["model"], "regression_tree");
        assert_eq!(value["train"]["samples"], 3);
        assert!(value.get("test").is_none());
        assert_eq!(value["features"][0]["value"], 0.75);
        assert_eq!(value["params"][0][0], "max_depth");
    }

    #[test]
    fn test_write_predictions() {
        let mut buf = Vec::new();
        write_predictions(&mut buf, &[1.0, 2.5], &[1.5, 2.0]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Predicted,Actual\n1.5,1\n2,2.5\n");
    }

    #[test]
    fn test_write_values() {
        let mut buf = Vec::new();
        write_values(&mut buf, &[0.25, 0.75]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0.25\n0.75\n");
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree_importances.csv");
        write_values_file(&path, &[1.0]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n");
    }
}
