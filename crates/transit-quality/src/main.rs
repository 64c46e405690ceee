//! CLI entry point for the transit data-quality engine.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use transit_quality::datasets::columns;
use transit_quality::{
    BaselineScorer, DatasetSpec, Pipeline, PipelineConfig, ReportGenerator, build_stop_directory,
    concat_frames, count_by_route, filter_routes,
};

/// Built-in dataset presets
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDataset {
    /// Hourly boarding/alighting counts per stop
    Hourly,
    /// Daily boarding/alighting totals per route
    Daily,
    /// Hourly weather observations
    Weather,
}

impl From<CliDataset> for DatasetSpec {
    fn from(cli: CliDataset) -> Self {
        match cli {
            CliDataset::Hourly => DatasetSpec::hourly_boarding(),
            CliDataset::Daily => DatasetSpec::daily_boarding(),
            CliDataset::Weather => DatasetSpec::weather(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Outlier capping, imputation and dense prediction lookups for transit ridership data",
    long_about = "Batch data-quality tool for bus ridership tables.\n\n\
                  EXAMPLES:\n  \
                  # Keep routes 606 and 420 from the monthly exports\n  \
                  transit-quality filter -i daily_boarding_202601.csv -i daily_boarding_202602.csv --name daily_boarding -o data/filtered\n\n  \
                  # Clean the daily boarding table\n  \
                  transit-quality clean --dataset daily -i daily_boarding_606_420.csv -o data/processed\n\n  \
                  # Build the dense prediction lookup for one route\n  \
                  transit-quality densify -i bus_standard_patterns_jan2026.csv -o public/data --name 420\n\n  \
                  # Export the stop directory\n  \
                  transit-quality stops -i final_bus_data_420.csv -o public/data --name 420"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the target routes of one or more raw exports and stack them
    Filter(FilterArgs),
    /// Cap outliers and impute missing values in one table
    Clean(CleanArgs),
    /// Expand a sparse pattern table into the full prediction lookup
    Densify(DensifyArgs),
    /// Write the stop directory JSON
    Stops(StopsArgs),
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Raw CSV exports, stacked in the order given
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "./data/filtered")]
    output: PathBuf,

    /// Output file prefix; the routes are appended, e.g. `daily_boarding_606_420`
    #[arg(short, long)]
    name: String,

    /// Routes to keep
    #[arg(long, value_delimiter = ',', default_value = "606,420")]
    routes: Vec<String>,

    /// Route number column
    #[arg(long, default_value = columns::ROUTE_NUMBER)]
    route_column: String,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Dataset preset describing how the table is corrected
    #[arg(short, long, value_enum)]
    dataset: CliDataset,

    /// Path to the CSV file to clean
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./data/processed")]
    output: PathBuf,

    /// IQR multiplier for the outlier upper bound (overrides the config file)
    #[arg(short, long)]
    multiplier: Option<f64>,

    /// JSON pipeline configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail when a field still has missing values after imputation
    #[arg(long)]
    strict: bool,

    /// Write a JSON cleaning report next to the cleaned table
    #[arg(short = 'r', long)]
    emit_report: bool,
}

#[derive(Args, Debug)]
struct DensifyArgs {
    /// Sparse pattern CSV (stop, dow, hour, value)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Name used in output file names; defaults to the input file stem
    #[arg(short, long)]
    name: Option<String>,

    /// JSON pipeline configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StopsArgs {
    /// Ridership CSV containing stop sequence numbers and stop names
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Route name used in the output file name
    #[arg(short, long)]
    name: String,

    /// Stop sequence column
    #[arg(long, default_value = columns::STOP_SEQUENCE)]
    seq_column: String,

    /// Stop name column
    #[arg(long, default_value = columns::STOP_NAME)]
    name_column: String,
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    match cli.command {
        Command::Filter(args) => run_filter(args),
        Command::Clean(args) => run_clean(args),
        Command::Densify(args) => run_densify(args),
        Command::Stops(args) => run_stops(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_filter(args: FilterArgs) -> Result<()> {
    let mut filtered = Vec::with_capacity(args.input.len());
    for path in &args.input {
        let data = load_csv(path)?;
        let kept = filter_routes(&data, &args.route_column, &args.routes)
            .with_context(|| format!("Failed to filter {}", path.display()))?;
        info!("{}: {} rows", path.display(), kept.height());
        filtered.push(kept);
    }

    let mut combined = concat_frames(filtered)?;
    let counts = count_by_route(&combined, &args.route_column)?;
    for route in &args.routes {
        match counts.get(route) {
            Some(rows) => info!("Route {}: {} rows", route, rows),
            None => warn!("Route {} not found in any input", route),
        }
    }

    let stem = format!("{}_{}", args.name, args.routes.join("_"));
    ReportGenerator::new(&args.output).write_table(&mut combined, &stem)?;
    Ok(())
}

fn run_clean(args: CleanArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(multiplier) = args.multiplier {
        config.iqr_multiplier = multiplier;
    }
    if args.strict {
        config.fail_on_unresolved = true;
    }

    let spec: DatasetSpec = args.dataset.into();
    let data = load_csv(&args.input)?;

    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(|update| {
            debug!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?;

    let mut cleaned = pipeline.clean(&data, &spec)?;

    let generator = ReportGenerator::new(&args.output);
    let output_path = generator.write_table(&mut cleaned.data, &format!("{}_clean", spec.name))?;

    let summary = &cleaned.summary;
    info!(
        "{}: {} rows, {} outliers capped, {} values filled",
        spec.name,
        summary.rows,
        summary.total_outliers(),
        summary.filled_by_field().values().sum::<usize>()
    );
    for field in &summary.unresolved_fields {
        warn!("'{}' still has missing values", field);
    }

    if args.emit_report {
        let report = ReportGenerator::build_cleaning_report(
            &args.input.to_string_lossy(),
            Some(output_path.to_string_lossy().as_ref()),
            summary,
        );
        generator.write_report(&report, &spec.name)?;
    }

    Ok(())
}

fn run_densify(args: DensifyArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let name = match args.name {
        Some(name) => name,
        None => args
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a name from {}", args.input.display()))?,
    };

    let patterns = load_csv(&args.input)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let dense = pipeline.densify(&patterns)?;
    let predictions = pipeline.predict(&dense, &BaselineScorer)?;

    let generator = ReportGenerator::new(&args.output);
    generator.write_prediction_table(&predictions, &pipeline.config().densify.columns, &name)?;
    generator.write_lookup_json(&predictions, pipeline.config().lookup_decimals, &name)?;

    Ok(())
}

fn run_stops(args: StopsArgs) -> Result<()> {
    let data = load_csv(&args.input)?;
    let stops = build_stop_directory(&data, &args.seq_column, &args.name_column)?;
    if stops.is_empty() {
        warn!("No stops found in {}", args.input.display());
    }

    ReportGenerator::new(&args.output).write_stops(&stops, &args.name)?;
    Ok(())
}

/// Load a CSV file, retrying with lossy UTF-8 decoding if strict decoding
/// fails.
fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    info!("Loading dataset from: {}", path.display());

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => {
            info!("Dataset loaded: {:?}", df.shape());
            return Ok(df);
        }
        Err(e) => debug!("Strict UTF-8 loading failed: {}", e),
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_encoding(CsvEncoding::LossyUtf8))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    warn!(
        "{} is not valid UTF-8; invalid bytes were replaced",
        path.display()
    );
    info!("Dataset loaded: {:?}", df.shape());
    Ok(df)
}
