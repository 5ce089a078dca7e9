//! Lapflux CLI - Command-line interface for Lapflux
//!
//! Commands:
//! - analyze: Derive the full session report from sample and lap tables
//! - stats: Session statistics over a lap and/or time-range selection
//! - validate: Check that tables parse and report recognized columns
//! - config: Print the default analysis configuration
//! - ingest: Store a raw activity file in the upload directory

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use lapflux::parser::{LapTableParser, ParsedTable, SampleTableParser, TableParser};
use lapflux::types::TableKind;
use lapflux::upload::DEFAULT_UPLOAD_FIELD;
use lapflux::{
    AnalysisConfig, ComputeError, LapFilter, PacingThreshold, SampleSelection, SessionAnalyzer,
    UploadStore, LAPFLUX_VERSION,
};

/// Environment variable holding the log filter
const LOG_ENV: &str = "LAPFLUX_LOG";

/// Lapflux - Interval-session analysis engine
#[derive(Parser)]
#[command(name = "lapflux")]
#[command(version = LAPFLUX_VERSION)]
#[command(about = "Derive lap, recovery, pacing and drift metrics from interval sessions", long_about = None)]
struct Cli {
    /// Log debug events to stderr (overridden by LAPFLUX_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the full session report
    Analyze {
        /// Sample table (CSV, use - for stdin)
        #[arg(short, long)]
        samples: Option<PathBuf>,

        /// Lap table (CSV, use - for stdin)
        #[arg(short, long)]
        laps: Option<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format (defaults to pretty JSON on a terminal)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Session statistics over a selection of samples
    Stats {
        /// Sample table (CSV, use - for stdin)
        #[arg(short, long)]
        samples: PathBuf,

        /// Lap table; when given, speed and heart rate use intensity laps only
        #[arg(short, long)]
        laps: Option<PathBuf>,

        /// Restrict to one lap number
        #[arg(long)]
        lap: Option<u32>,

        /// Start of the kept range as a fraction of the selection
        #[arg(long, default_value = "0")]
        from: f64,

        /// End of the kept range as a fraction of the selection
        #[arg(long, default_value = "1")]
        to: f64,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Check that tables parse and report what was recognized
    Validate {
        /// Sample table (CSV, use - for stdin)
        #[arg(short, long)]
        samples: Option<PathBuf>,

        /// Lap table (CSV, use - for stdin)
        #[arg(short, long)]
        laps: Option<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default analysis configuration
    Config,

    /// Store a raw activity file in the upload directory
    Ingest {
        /// File to store
        #[arg(short, long)]
        input: PathBuf,

        /// Upload directory (created if missing)
        #[arg(short, long, default_value = "uploads")]
        dir: PathBuf,

        /// Form field name recorded in the stored file name
        #[arg(long, default_value = DEFAULT_UPLOAD_FIELD)]
        field: String,
    },
}

/// Configuration file plus per-flag overrides
#[derive(clap::Args)]
struct TuningArgs {
    /// Analysis configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Laps per series
    #[arg(long)]
    group_size: Option<usize>,

    /// Fixed pacing threshold (%)
    #[arg(long, conflicts_with = "median_threshold")]
    pacing_threshold: Option<f64>,

    /// Use the median pacing delta of the session as the threshold
    #[arg(long)]
    median_threshold: bool,
}

impl TuningArgs {
    fn load(&self) -> Result<AnalysisConfig, LapfluxCliError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
            None => AnalysisConfig::default(),
        };

        if let Some(size) = self.group_size {
            config = config.with_group_size(size);
        }
        if let Some(percent) = self.pacing_threshold {
            config = config.with_pacing_threshold(PacingThreshold::Fixed { percent });
        }
        if self.median_threshold {
            config = config.with_pacing_threshold(PacingThreshold::Median);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), LapfluxCliError> {
    match cli.command {
        Commands::Analyze {
            samples,
            laps,
            tuning,
            output,
            format,
        } => cmd_analyze(samples.as_deref(), laps.as_deref(), &tuning, &output, format),

        Commands::Stats {
            samples,
            laps,
            lap,
            from,
            to,
            tuning,
        } => cmd_stats(&samples, laps.as_deref(), lap, (from, to), &tuning),

        Commands::Validate {
            samples,
            laps,
            tuning,
            json,
        } => cmd_validate(samples.as_deref(), laps.as_deref(), &tuning, json),

        Commands::Config => cmd_config(),

        Commands::Ingest { input, dir, field } => cmd_ingest(&input, &dir, &field),
    }
}

fn cmd_analyze(
    samples: Option<&Path>,
    laps: Option<&Path>,
    tuning: &TuningArgs,
    output: &Path,
    format: Option<OutputFormat>,
) -> Result<(), LapfluxCliError> {
    if samples.is_none() && laps.is_none() {
        return Err(LapfluxCliError::NoInput);
    }

    let config = tuning.load()?;
    let samples_csv = samples.map(read_input).transpose()?;
    let laps_csv = laps.map(read_input).transpose()?;

    let analyzer = SessionAnalyzer::new(config)?;
    let report = analyzer.analyze(samples_csv.as_deref(), laps_csv.as_deref());

    for error in &report.table_errors {
        tracing::warn!(table = ?error.table, message = %error.message, "table skipped");
    }

    let to_stdout = is_stdout(output);
    let format = format.unwrap_or(if to_stdout && atty::is(atty::Stream::Stdout) {
        OutputFormat::JsonPretty
    } else {
        OutputFormat::Json
    });

    let encoder = lapflux::ReportEncoder::new();
    let rendered = match format {
        OutputFormat::Json => encoder.encode_to_compact_json(&report, analyzer.config())?,
        OutputFormat::JsonPretty => encoder.encode_to_json(&report, analyzer.config())?,
    };

    write_output(output, &rendered)
}

fn cmd_stats(
    samples: &Path,
    laps: Option<&Path>,
    lap: Option<u32>,
    (from, to): (f64, f64),
    tuning: &TuningArgs,
) -> Result<(), LapfluxCliError> {
    let analyzer = SessionAnalyzer::new(tuning.load()?)?;

    let samples = analyzer.parse_samples(&read_input(samples)?)?;
    let laps = match laps {
        Some(path) => Some(analyzer.parse_laps(&read_input(path)?)?),
        None => None,
    };

    let selection = SampleSelection {
        lap: lap.map_or(LapFilter::All, LapFilter::Lap),
        range: (from, to),
    };
    let stats = analyzer.selection_stats(&samples, laps.as_deref(), &selection);

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_validate(
    samples: Option<&Path>,
    laps: Option<&Path>,
    tuning: &TuningArgs,
    json: bool,
) -> Result<(), LapfluxCliError> {
    if samples.is_none() && laps.is_none() {
        return Err(LapfluxCliError::NoInput);
    }

    let config = tuning.load()?;
    let mut tables = Vec::new();

    if let Some(path) = samples {
        let parser = SampleTableParser::with_extra_aliases(&config.sample_field_aliases);
        tables.push(validate_table(TableKind::Samples, path, &parser)?);
    }
    if let Some(path) = laps {
        let parser = LapTableParser::with_extra_aliases(&config.lap_field_aliases);
        tables.push(validate_table(TableKind::Laps, path, &parser)?);
    }

    let failed = tables.iter().filter(|t| t.error.is_some()).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
    } else {
        println!("Validation Report");
        println!("=================");
        for table in &tables {
            println!();
            println!("Table:        {:?}", table.table);
            println!("Path:         {}", table.path);
            match &table.error {
                Some(error) => println!("Error:        {error}"),
                None => {
                    println!("Records:      {}", table.records);
                    println!("Dropped rows: {}", table.dropped_rows);
                    println!("Recognized:   {}", table.recognized_columns.join(", "));
                    if !table.unrecognized_columns.is_empty() {
                        println!("Ignored:      {}", table.unrecognized_columns.join(", "));
                    }
                }
            }
        }
    }

    if failed > 0 {
        Err(LapfluxCliError::ValidationFailed(failed))
    } else {
        Ok(())
    }
}

fn validate_table<P: TableParser>(
    table: TableKind,
    path: &Path,
    parser: &P,
) -> Result<TableValidation, LapfluxCliError> {
    let text = read_input(path)?;
    let mut validation = TableValidation {
        table,
        path: path.display().to_string(),
        records: 0,
        dropped_rows: 0,
        recognized_columns: Vec::new(),
        unrecognized_columns: Vec::new(),
        error: None,
    };

    match parser.parse(&text) {
        Ok(ParsedTable {
            records,
            dropped_rows,
            recognized_columns,
            unrecognized_columns,
        }) => {
            validation.records = records.len();
            validation.dropped_rows = dropped_rows;
            validation.recognized_columns = recognized_columns;
            validation.unrecognized_columns = unrecognized_columns;
        }
        Err(e) => validation.error = Some(e.to_string()),
    }

    Ok(validation)
}

fn cmd_config() -> Result<(), LapfluxCliError> {
    println!("{}", AnalysisConfig::default().to_json()?);
    Ok(())
}

fn cmd_ingest(input: &Path, dir: &Path, field: &str) -> Result<(), LapfluxCliError> {
    let receipt = UploadStore::new(dir).store_file(field, input)?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

// Helper functions

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> Result<String, LapfluxCliError> {
    if is_stdout(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, content: &str) -> Result<(), LapfluxCliError> {
    if is_stdout(path) {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{content}")?;
        stdout.flush()?;
    } else {
        fs::write(path, format!("{content}\n"))?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum LapfluxCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoInput,
    ValidationFailed(usize),
}

impl From<io::Error> for LapfluxCliError {
    fn from(e: io::Error) -> Self {
        LapfluxCliError::Io(e)
    }
}

impl From<ComputeError> for LapfluxCliError {
    fn from(e: ComputeError) -> Self {
        LapfluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for LapfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        LapfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LapfluxCliError> for CliError {
    fn from(e: LapfluxCliError) -> Self {
        match e {
            LapfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LapfluxCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::ParseError(_) | ComputeError::CsvError(_) => (
                        "PARSE_ERROR",
                        "Ensure the table is comma-separated with a header row",
                    ),
                    ComputeError::InvalidConfig(_) | ComputeError::JsonError(_) => (
                        "CONFIG_ERROR",
                        "Run 'lapflux config' to see a valid configuration",
                    ),
                    ComputeError::EmptyUpload(_) => ("EMPTY_UPLOAD", "Ensure the input file is not empty"),
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LapfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            LapfluxCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No sample or lap table given".to_string(),
                hint: Some("Pass --samples and/or --laps".to_string()),
            },
            LapfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} table(s) failed to parse"),
                hint: Some("Fix the reported tables and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct TableValidation {
    table: TableKind,
    path: String,
    records: usize,
    dropped_rows: usize,
    recognized_columns: Vec<&'static str>,
    unrecognized_columns: Vec<String>,
    error: Option<String>,
}
