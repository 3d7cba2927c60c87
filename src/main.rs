//! CLI entry point for the exam statistics tool.
//!
//! Reads one CSV page per problem, grades every student and writes a LaTeX
//! (or JSON) report plus a CSV summary into the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use exam_stats::config::{ExamConfig, parse_option};
use exam_stats::loader::read_pages;
use exam_stats::output::{Format, RenderSettings, publish};
use exam_stats::transform::Transform;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "exam-stats")]
#[command(about = "Turns per-question exam scores into normalized grades and a report", long_about = None)]
struct Cli {
    /// CSV pages (one per problem) or directories of CSV pages
    #[arg(value_name = "PAGES", required = true)]
    inputs: Vec<PathBuf>,

    /// Exam name shown on every report (defaults to the first input's name)
    #[arg(long)]
    exam_name: Option<String>,

    /// Only consider the first N pages (-1 = all)
    #[arg(long, allow_negative_numbers = true)]
    pages: Option<i64>,

    /// Number of results per output page
    #[arg(long)]
    per_page: Option<usize>,

    /// Expression applied to the final grade, `x` being the grade
    #[arg(long, default_value = "x")]
    transform: String,

    /// Mean after normalization
    #[arg(long)]
    mean: Option<f64>,

    /// Standard deviation after normalization
    #[arg(long)]
    std: Option<f64>,

    /// Rendering option as name:value; may be repeated
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Write one file per student
    #[arg(long, default_value_t = false)]
    split: bool,

    /// Output format of the report
    #[arg(long, value_enum, default_value_t = Format::Tex)]
    format: Format,

    /// Output directory
    #[arg(long, default_value = "out")]
    outdir: PathBuf,

    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // LOG_FILE_PATH, RUST_LOG and RUST_LOG_JSON may come from .env
    dotenvy::dotenv().ok();
    let _file_guard = init_logging();

    let cli = Cli::parse();

    match grade(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Grading aborted");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Installs a colored stderr layer and a JSON layer over a daily-rolling file.
/// The returned guard flushes the file writer when dropped.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/exam_stats.log".to_string());
    let log_path = Path::new(&log_file_path);
    let log_dir = log_path.parent().unwrap_or(Path::new("logs"));
    let log_file_name = log_path
        .file_name()
        .unwrap_or(OsStr::new("exam_stats.log"));

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, log_file_name));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

/// Builds the run configuration: file first, then command-line overrides.
fn build_config(cli: &Cli) -> Result<ExamConfig> {
    let mut config = match &cli.config {
        Some(path) => ExamConfig::load(path)?,
        None => ExamConfig::default(),
    };

    if let Some(pages) = cli.pages {
        config.pages = pages;
    }
    if let Some(per_page) = cli.per_page {
        config.results_per_page = per_page;
    }
    if cli.mean.is_some() {
        config.target_mean = cli.mean;
    }
    if cli.std.is_some() {
        config.target_std = cli.std;
    }
    config.render.extend(cli.options.iter().cloned());
    config.check()?;

    Ok(config)
}

fn default_exam_name(inputs: &[PathBuf]) -> String {
    inputs
        .first()
        .and_then(|p| if p.is_dir() { p.file_name() } else { p.file_stem() })
        .and_then(OsStr::to_str)
        .unwrap_or("exam")
        .to_string()
}

#[tracing::instrument(skip_all, fields(outdir = %cli.outdir.display(), split = cli.split))]
fn grade(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    // Parsed before any file is read so a bad expression fails fast.
    let transform = Transform::parse(&cli.transform)?;
    let exam_name = cli
        .exam_name
        .clone()
        .unwrap_or_else(|| default_exam_name(&cli.inputs));

    info!(
        exam = %exam_name,
        transform = %transform,
        options = ?config.render_options(),
        "Starting grading run"
    );

    let pages = read_pages(&cli.inputs, config.pages).context("reading pages")?;
    publish(
        &pages,
        &exam_name,
        &config,
        &transform,
        &RenderSettings {
            format: cli.format,
            split: cli.split,
            results_per_page: config.results_per_page,
            options: config.render_options(),
        },
        &cli.outdir,
    )?;

    Ok(())
}
