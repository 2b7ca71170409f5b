use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use predict_attack::{
    config::{Config, ObservabilityConfig},
    ml::{ModelStore, PredictionReport, PredictionService, SchemaVariant},
    severity::{self, classify},
    table::{read_csv_file, template_table, write_csv, write_csv_file, Table},
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator::Validate;

/// Width of the probability bar in table output
const BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "predict-attack")]
#[command(version, about = "Predict likely cyberattack types from a vulnerability list", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the most likely attack types for an uploaded CSV
    Predict {
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Directory holding model.json, encoders.json and feature_columns.json
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Number of attack types to report
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Required-column set: core or banking
        #[arg(short, long)]
        variant: Option<SchemaVariant>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Print the first N uploaded rows to stderr before predicting
        #[arg(short, long, value_name = "N")]
        preview: Option<usize>,
    },

    /// Print the severity band for each CVSS score
    Severity {
        #[arg(value_name = "SCORE", required = true, allow_negative_numbers = true)]
        scores: Vec<f64>,
    },

    /// Append a severity_band column to a CSV with a CVSS column
    Annotate {
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Write the annotated CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an example upload in the expected schema
    Template {
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        variant: Option<SchemaVariant>,
    },

    /// Check the model directory
    Diagnose {
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.observability);

    tracing::debug!("predict-attack v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Predict {
            input,
            model_dir,
            top_k,
            variant,
            format,
            preview,
        } => {
            if let Some(dir) = model_dir {
                config.models.dir = dir;
            }
            if let Some(k) = top_k {
                config.prediction.top_k = k;
            }
            if let Some(v) = variant {
                config.schema.variant = v;
            }
            config
                .prediction
                .validate()
                .context("Invalid prediction options")?;

            let bundle = ModelStore::load(&config.models).with_context(|| {
                format!(
                    "Failed to load model artifacts from {}",
                    config.models.dir.display()
                )
            })?;
            let service = PredictionService::new(bundle, &config)?;
            let metadata = service.model_metadata();
            tracing::info!(
                model = %metadata.name,
                version = %metadata.version,
                variant = %service.variant(),
                top_k = service.top_k(),
                "Prediction service ready"
            );

            let table = read_csv_file(&input)?;
            if let Some(n) = preview {
                eprintln!("Preview ({} of {} rows):", n.min(table.n_rows()), table.n_rows());
                eprint!("{}", write_csv(&table.head(n)));
                eprintln!();
            }
            let report = service.predict_table(&table)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => print_report(&report),
            }
        }

        Commands::Severity { scores } => {
            let mut rejected = 0;
            for score in &scores {
                match classify(*score) {
                    Ok(band) => println!("{}\t{}", score, band),
                    Err(e) => {
                        eprintln!("{}\t{}", score, e);
                        rejected += 1;
                    }
                }
            }
            if rejected > 0 {
                bail!("{} of {} scores were out of range", rejected, scores.len());
            }
        }

        Commands::Annotate { input, output } => {
            let table = read_csv_file(&input)?;
            let annotation = severity::annotate(&table)?;

            for r in &annotation.rejected {
                eprintln!("row {}: {:?} ({})", r.row, r.value, r.reason);
            }
            emit(&annotation.table, output.as_deref())?;
            eprintln!(
                "Annotated {} rows from column '{}' ({} without a band)",
                annotation.table.n_rows(),
                annotation.source_column,
                annotation.rejected.len()
            );
        }

        Commands::Template { output, variant } => {
            let table = template_table(variant.unwrap_or(config.schema.variant));
            emit(&table, output.as_deref())?;
        }

        Commands::Diagnose { model_dir } => {
            if let Some(dir) = model_dir {
                config.models.dir = dir;
            }
            let diagnostics = ModelStore::diagnostics(&config.models);
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);

            if !diagnostics.is_ready() {
                bail!(
                    "Model artifacts in {} are incomplete",
                    diagnostics.dir.display()
                );
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("predict_attack={}", config.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn emit(table: &Table, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            write_csv_file(table, path)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", write_csv(table)),
    }
    Ok(())
}

fn print_report(report: &PredictionReport) {
    println!("Top attack types ({} rows analysed)", report.rows_analysed);
    println!();

    let width = report
        .result
        .ranked
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0);

    for attack in &report.result.ranked {
        let filled = (attack.probability * BAR_WIDTH as f64).round() as usize;
        println!(
            "{:>2}. {:<width$}  {:>6.1}%  {}",
            attack.rank,
            attack.label,
            attack.probability * 100.0,
            "█".repeat(filled.min(BAR_WIDTH)),
            width = width
        );
    }

    if !report.ignored_columns.is_empty() {
        println!();
        println!("Ignored columns: {}", report.ignored_columns.join(", "));
    }
}
