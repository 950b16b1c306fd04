//! Delay CLI - Command-line interface for the flight delay model
//!
//! Commands:
//! - train: Fit the model on historical flight records and save the artifact
//! - predict: Score a `{"flights": [...]}` request with the saved artifact
//! - evaluate: Score the saved artifact against labeled records
//! - validate: Check a prediction request without touching the model
//! - doctor: Diagnose configuration and artifact health
//! - schema: Print the feature schema and request format

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use flight_delay::metrics::ClassificationReport;
use flight_delay::validator::{FLIGHTS_KEY, REQUIRED_COLUMNS, VALID_TIPOVUELO};
use flight_delay::{
    DelayConfig, DelayError, DelayModel, FeatureSchema, FileModelStore, FlightRecord,
    ModelArtifact, ModelStore, RecordAdapter, RequestValidator, DELAY_VERSION, PRODUCER_NAME,
};

/// Delay - Flight delay classifier
#[derive(Parser)]
#[command(name = "delay")]
#[command(version = DELAY_VERSION)]
#[command(about = "Train and query a flight delay classifier", long_about = None)]
struct Cli {
    /// Config file (TOML, JSON or YAML); DELAY_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the model on flight records with scheduled and actual times
    Train {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Model artifact path (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output training summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict delays for a {"flights": [...]} request
    Predict {
        /// Request file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Model artifact path (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Pretty-print the response
        #[arg(long)]
        pretty: bool,
    },

    /// Score the saved model against labeled flight records
    Evaluate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Model artifact path (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a prediction request
    Validate {
        /// Request file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and model artifact
    Doctor {
        /// Model artifact path (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature schema and request format
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let installed = if log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        eprintln!("warning: tracing subscriber already installed");
    }
}

fn run(cli: Cli) -> Result<(), DelayCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Train {
            input,
            input_format,
            model,
            json,
        } => {
            let config = load_config(config_path, model)?;
            cmd_train(&config, &input, input_format, json)
        }

        Commands::Predict {
            input,
            output,
            model,
            pretty,
        } => {
            let config = load_config(config_path, model)?;
            cmd_predict(&config, &input, &output, pretty)
        }

        Commands::Evaluate {
            input,
            input_format,
            model,
            json,
        } => {
            let config = load_config(config_path, model)?;
            cmd_evaluate(&config, &input, input_format, json)
        }

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { model, json } => cmd_doctor(config_path, model, json),

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn load_config(path: Option<&Path>, model: Option<PathBuf>) -> Result<DelayConfig, DelayCliError> {
    let mut config = DelayConfig::load_from(path)?;
    if let Some(model_path) = model {
        config.model_path = model_path;
    }
    debug!(model_path = %config.model_path.display(), "configuration loaded");
    Ok(config)
}

fn cmd_train(
    config: &DelayConfig,
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), DelayCliError> {
    let records = read_records(input, input_format)?;
    let model = DelayModel::from_config(config);
    let artifact = model.train(&records)?;

    let summary = TrainingSummary::new(&artifact, model.store().location());

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Training Summary");
        println!("================");
        println!("Model ID:   {}", summary.model_id);
        println!("Saved to:   {}", summary.location);
        println!("Samples:    {}", summary.n_samples);
        println!("Iterations: {} (converged: {})", summary.n_iter, summary.converged);
        println!(
            "Weights:    on-time {:.4}, delayed {:.4}",
            artifact.class_weights.on_time, artifact.class_weights.delayed
        );
        println!("\nCoefficients:");
        println!("  {:<28} {:>10.4}", "intercept", summary.intercept);
        for coefficient in &summary.coefficients {
            println!("  {:<28} {:>10.4}", coefficient.column, coefficient.value);
        }
    }

    Ok(())
}

fn cmd_predict(
    config: &DelayConfig,
    input: &Path,
    output: &Path,
    pretty: bool,
) -> Result<(), DelayCliError> {
    let request = read_input(input)?;
    let model = DelayModel::from_config(config);
    let response = model.predict_request(&request)?;
    info!(flights = response.predict.len(), "prediction complete");

    let output_data = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };

    if is_stdio(output) {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data + "\n")?;
    }

    Ok(())
}

fn cmd_evaluate(
    config: &DelayConfig,
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), DelayCliError> {
    let records = read_records(input, input_format)?;
    let model = DelayModel::from_config(config);
    let report = model.evaluate(&records)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &ClassificationReport) {
    println!("Evaluation Report");
    println!("=================");
    println!("Accuracy: {:.4}", report.accuracy);
    println!();
    println!("{:<10} {:>10} {:>10} {:>10} {:>10}", "class", "precision", "recall", "f1-score", "support");
    for (name, metrics) in [("0", &report.on_time), ("1", &report.delayed)] {
        println!(
            "{:<10} {:>10.4} {:>10.4} {:>10.4} {:>10}",
            name, metrics.precision, metrics.recall, metrics.f1_score, metrics.support
        );
    }
    println!();
    println!("Confusion matrix (rows: actual, columns: predicted)");
    println!(
        "  0: {:>8} {:>8}",
        report.confusion.true_on_time, report.confusion.false_delayed
    );
    println!(
        "  1: {:>8} {:>8}",
        report.confusion.false_on_time, report.confusion.true_delayed
    );
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), DelayCliError> {
    let input_data = read_input(input)?;
    let body: serde_json::Value = serde_json::from_str(&input_data)?;

    let errors = RequestValidator::validate_all(&body);
    let total_records = body
        .get(FLIGHTS_KEY)
        .and_then(|v| v.as_array())
        .map(|flights| flights.len())
        .unwrap_or(0);

    let mut invalid_indices: Vec<usize> = errors.iter().filter_map(|e| e.index()).collect();
    invalid_indices.dedup();

    let report = ValidationReport {
        total_records,
        invalid_records: invalid_indices.len(),
        errors: errors
            .iter()
            .map(|e| ValidationErrorDetail {
                index: e.index(),
                error: e.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                match err.index {
                    Some(index) => println!("  - Record {}: {}", index, err.error),
                    None => println!("  - Request: {}", err.error),
                }
            }
        }
    }

    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(DelayCliError::ValidationFailed(report.errors.len()))
    }
}

fn cmd_doctor(
    config_path: Option<&Path>,
    model: Option<PathBuf>,
    json: bool,
) -> Result<(), DelayCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, DELAY_VERSION),
    });

    checks.push(DoctorCheck {
        name: "feature_schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} columns", FeatureSchema::columns().len()),
    });

    let config = match load_config(config_path, model) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "threshold {} min, C={}, max_iter={}, tol={}",
                    config.delay_threshold_minutes,
                    config.regularization,
                    config.max_iter,
                    config.tolerance
                ),
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            });
            None
        }
    };

    if let Some(config) = &config {
        checks.push(check_artifact(&FileModelStore::new(&config.model_path)));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DELAY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Delay Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DelayCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_artifact(store: &FileModelStore) -> DoctorCheck {
    let result = store.load().and_then(|artifact| {
        artifact.check()?;
        Ok(artifact)
    });

    match result {
        Ok(artifact) => DoctorCheck {
            name: "model_artifact".to_string(),
            status: if artifact.converged {
                CheckStatus::Ok
            } else {
                CheckStatus::Warning
            },
            message: format!(
                "{} trained {} on {} samples (converged: {})",
                artifact.model_id,
                artifact.trained_at.to_rfc3339(),
                artifact.n_samples,
                artifact.converged
            ),
        },
        Err(DelayError::StorageNotFound(location)) => DoctorCheck {
            name: "model_artifact".to_string(),
            status: CheckStatus::Warning,
            message: format!("No artifact at {} (run 'delay train')", location),
        },
        Err(e) => DoctorCheck {
            name: "model_artifact".to_string(),
            status: CheckStatus::Error,
            message: format!("Unusable artifact at {}: {}", store.location(), e),
        },
    }
}

fn cmd_schema(json: bool) -> Result<(), DelayCliError> {
    if json {
        let schema = serde_json::json!({
            "feature_columns": FeatureSchema::names(),
            "request": {
                "key": FLIGHTS_KEY,
                "required_columns": REQUIRED_COLUMNS,
                "TIPOVUELO": VALID_TIPOVUELO,
                "MES": { "minimum": 1, "maximum": 12 }
            },
            "response": { "predict": "array of 0 (on time) or 1 (delayed)" }
        });
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        println!("Feature Schema");
        println!("==============");
        for (position, column) in FeatureSchema::columns().iter().enumerate() {
            println!(
                "  {:>2}. {:<28} from {}",
                position + 1,
                column.name(),
                column.field().prefix()
            );
        }
        println!();
        println!("Categories outside these columns encode as all-false.");
        println!();
        println!("Request: {{\"{}\": [{{...}}, ...]}}", FLIGHTS_KEY);
        println!("  - OPERA: operating airline, non-empty string");
        println!("  - TIPOVUELO: one of {}", VALID_TIPOVUELO.join(", "));
        println!("  - MES: month, integer 1-12");
        println!();
        println!("Training records additionally carry Fecha-I (scheduled) and Fecha-O");
        println!("(actual) as YYYY-MM-DD HH:MM:SS.");
    }

    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, DelayCliError> {
    if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_records(input: &Path, input_format: InputFormat) -> Result<Vec<FlightRecord>, DelayCliError> {
    let input_data = read_input(input)?;
    let records = match input_format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordAdapter::parse_array(&input_data)?,
    };

    if records.is_empty() {
        return Err(DelayCliError::NoRecords);
    }
    info!(records = records.len(), input = %input.display(), "records loaded");
    Ok(records)
}

// Error types

#[derive(Debug)]
enum DelayCliError {
    Io(io::Error),
    Delay(DelayError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for DelayCliError {
    fn from(e: io::Error) -> Self {
        DelayCliError::Io(e)
    }
}

impl From<DelayError> for DelayCliError {
    fn from(e: DelayError) -> Self {
        DelayCliError::Delay(e)
    }
}

impl From<serde_json::Error> for DelayCliError {
    fn from(e: serde_json::Error) -> Self {
        DelayCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DelayCliError> for CliError {
    fn from(e: DelayCliError) -> Self {
        match e {
            DelayCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DelayCliError::Delay(e) => CliError::from(e),
            DelayCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DelayCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No flight records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DelayCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} validation errors", count),
                hint: Some("Fix the listed records and retry".to_string()),
            },
            DelayCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

impl From<DelayError> for CliError {
    fn from(e: DelayError) -> Self {
        let (code, hint) = match &e {
            DelayError::Validation(_) => ("VALIDATION_ERROR", "Run 'delay validate' for details"),
            DelayError::TimestampParse { .. } | DelayError::MissingTimestamp { .. } => (
                "LABEL_ERROR",
                "Training records need Fecha-I and Fecha-O as YYYY-MM-DD HH:MM:SS",
            ),
            DelayError::EmptyLabels => ("NO_RECORDS", "Ensure input file is not empty"),
            DelayError::StorageNotFound(_) => ("MODEL_NOT_FOUND", "Run 'delay train' first"),
            DelayError::Classifier(_) => ("MODEL_ERROR", "Retrain with 'delay train'"),
            DelayError::ParseError(_) => ("PARSE_ERROR", "Check input format"),
            DelayError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
            DelayError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
            DelayError::Config(_) => ("CONFIG_ERROR", "Check --config and DELAY_* variables"),
        };
        CliError {
            code: code.to_string(),
            message: e.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct TrainingSummary {
    model_id: String,
    location: String,
    n_samples: usize,
    n_iter: usize,
    converged: bool,
    intercept: f64,
    coefficients: Vec<CoefficientDetail>,
}

impl TrainingSummary {
    fn new(artifact: &ModelArtifact, location: String) -> Self {
        Self {
            model_id: artifact.model_id.to_string(),
            location,
            n_samples: artifact.n_samples,
            n_iter: artifact.n_iter,
            converged: artifact.converged,
            intercept: artifact.intercept,
            coefficients: artifact
                .coefficients_by_column()
                .into_iter()
                .map(|(column, value)| CoefficientDetail {
                    column: column.name().to_string(),
                    value,
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct CoefficientDetail {
    column: String,
    value: f64,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: Option<usize>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
