//! # cupping
//!
//! Command-line interface: trains a regression tree or a gradient-descent
//! linear model on a coffee cupping CSV and reports RMSE / R² together with
//! feature importances or weights.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use cupping::report::{write_predictions_file, write_values_file};
use cupping::{
    load_csv, train_test_split, EvaluationReport, LinearRegression, RegressionTree, Result, TrainTestSplit,
    DEFAULT_FEATURE_COLUMNS, DEFAULT_TARGET_COLUMN,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "cupping")]
#[command(about = "Predict coffee flavor scores from cupping scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and evaluate a regression tree
    Tree {
        #[command(flatten)]
        data: DataArgs,

        /// Maximum depth of the tree
        #[arg(long, default_value = "12")]
        max_depth: usize,

        /// Minimum samples required to split a node
        #[arg(long, default_value = "20")]
        min_samples_split: usize,
    },

    /// Train and evaluate a linear regression with gradient descent
    Linear {
        #[command(flatten)]
        data: DataArgs,

        /// Gradient descent step size
        #[arg(long, default_value = "0.01")]
        learning_rate: f64,

        /// Maximum number of gradient descent iterations
        #[arg(long, default_value = "10000")]
        iterations: usize,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Input CSV file with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// Feature columns (comma separated)
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_FEATURE_COLUMNS)]
    features: Vec<String>,

    /// Target column
    #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
    target: String,

    /// Fraction of rows used for training
    #[arg(long, default_value = "0.8")]
    train_fraction: f64,

    /// Seed for the train/test shuffle (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for prediction and importance/weight CSV files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

struct Prepared {
    split: TrainTestSplit,
    feature_names: Vec<String>,
}

fn prepare(data: &DataArgs) -> Result<Prepared> {
    let dataset = load_csv(&data.input, &data.features, &data.target)?;
    info!(
        samples = dataset.n_samples(),
        features = dataset.n_features(),
        skipped = dataset.skipped_rows,
        "loaded {}",
        data.input.display()
    );

    let split = train_test_split(&dataset.features, &dataset.targets, data.train_fraction, data.seed)?;
    info!(
        train = split.x_train.nrows(),
        test = split.x_test.nrows(),
        "split dataset"
    );

    Ok(Prepared {
        split,
        feature_names: dataset.feature_names,
    })
}

fn emit(report: &EvaluationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

/// Writes `<prefix>_predictions.csv` for the test set (the training set when
/// the test set is empty) and `<prefix>_<values_name>.csv`.
fn write_outputs(
    dir: &Path,
    prefix: &str,
    values_name: &str,
    actual: &[f64],
    predicted: &[f64],
    values: &[f64],
) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let predictions_path = dir.join(format!("{}_predictions.csv", prefix));
    write_predictions_file(&predictions_path, actual, predicted)?;

    let values_path = dir.join(format!("{}_{}.csv", prefix, values_name));
    write_values_file(&values_path, values)?;

    info!(
        predictions = %predictions_path.display(),
        values = %values_path.display(),
        "wrote results"
    );
    Ok(())
}

fn run_tree(data: DataArgs, max_depth: usize, min_samples_split: usize) -> Result<()> {
    let Prepared { split, feature_names } = prepare(&data)?;

    info!(max_depth, min_samples_split, "training regression tree");
    let mut model = RegressionTree::new(max_depth, min_samples_split);
    model.fit(&split.x_train, &split.y_train)?;

    let train_pred = model.predict(&split.x_train)?;
    let test_pred = model.predict(&split.x_test)?;
    let importances = model.feature_importances()?;

    let report = EvaluationReport::new(
        "regression_tree",
        (split.y_train.as_slice(), train_pred.as_slice()),
        (split.y_test.as_slice(), test_pred.as_slice()),
        "importance",
        &feature_names,
        importances,
    )?
    .with_param("max_depth", max_depth)
    .with_param("min_samples_split", min_samples_split)
    .with_param("depth", model.depth().unwrap_or(0))
    .with_param("leaves", model.n_leaves().unwrap_or(0));

    emit(&report, data.json)?;

    if let Some(dir) = &data.output_dir {
        let (actual, predicted) = if split.y_test.is_empty() {
            (&split.y_train, &train_pred)
        } else {
            (&split.y_test, &test_pred)
        };
        write_outputs(
            dir,
            "tree",
            "importances",
            actual.as_slice(),
            predicted.as_slice(),
            importances,
        )?;
    }

    Ok(())
}

fn run_linear(data: DataArgs, learning_rate: f64, iterations: usize) -> Result<()> {
    let Prepared { split, feature_names } = prepare(&data)?;

    info!(learning_rate, iterations, "training linear regression");
    let mut model = LinearRegression::new(learning_rate, iterations);
    model.fit(&split.x_train, &split.y_train)?;

    let train_pred = model.predict(&split.x_train)?;
    let test_pred = model.predict(&split.x_test)?;
    let weights = model.weights()?;

    let report = EvaluationReport::new(
        "linear_regression",
        (split.y_train.as_slice(), train_pred.as_slice()),
        (split.y_test.as_slice(), test_pred.as_slice()),
        "weight",
        &feature_names,
        weights.as_slice(),
    )?
    .with_param("learning_rate", learning_rate)
    .with_param("max_iter", iterations)
    .with_param("iterations_run", model.n_iter())
    .with_bias(model.bias());

    emit(&report, data.json)?;

    if let Some(dir) = &data.output_dir {
        let (actual, predicted) = if split.y_test.is_empty() {
            (&split.y_train, &train_pred)
        } else {
            (&split.y_test, &test_pred)
        };
        write_outputs(
            dir,
            "linear",
            "weights",
            actual.as_slice(),
            predicted.as_slice(),
            weights.as_slice(),
        )?;
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tree {
            data,
            max_depth,
            min_samples_split,
        } => run_tree(data, max_depth, min_samples_split),
        Commands::Linear {
            data,
            learning_rate,
            iterations,
        } => run_linear(data, learning_rate, iterations),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
