//! CLI entry point for kelp
//!
//! Parses command line arguments, layers them over the configuration and runs
//! one conversion batch (or one piped conversion).

use clap::{Parser, Subcommand};
use kelp::config::ConfigError;
use kelp::{
    resolve_sources, BatchController, BatchError, BatchOutcome, Config, FormatEncoder,
    TargetFormat,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// At least one file failed to convert
const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Invalid configuration or arguments
const EXIT_CONFIG: u8 = 2;
/// Arguments resolved to no files
const EXIT_NO_INPUT: u8 = 3;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// kelp - convert images between formats, in parallel
#[derive(Parser, Debug)]
#[command(name = "kelp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overwrite existing destination files
    #[arg(short, long, global = true)]
    force: bool,

    /// Number of files converted in parallel
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    jobs: Option<i64>,

    /// Do not draw a progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    /// Write converted files under this directory, mirroring the source tree
    #[arg(long, global = true)]
    outdir: Option<PathBuf>,

    /// Read one image from stdin and write the converted image to stdout
    #[arg(long, global = true)]
    pipe: bool,

    #[command(subcommand)]
    format: Format,
}

/// Target format
#[derive(Subcommand, Debug)]
enum Format {
    /// Convert to BMP
    Bmp(Inputs),
    /// Convert to PNG
    Png(Inputs),
    /// Convert to GIF
    Gif(Inputs),
    /// Convert to JPEG
    #[command(alias = "jpeg")]
    Jpg {
        /// JPEG quality (1-100)
        #[arg(short, long, allow_negative_numbers = true)]
        quality: Option<i64>,

        #[command(flatten)]
        inputs: Inputs,
    },
}

#[derive(clap::Args, Debug)]
struct Inputs {
    /// Files, directories or glob patterns to convert
    files: Vec<String>,
}

impl Format {
    fn inputs(&self) -> &Inputs {
        match self {
            Format::Bmp(inputs) | Format::Png(inputs) | Format::Gif(inputs) => inputs,
            Format::Jpg { inputs, .. } => inputs,
        }
    }

    fn target(&self, config: &Config) -> Result<TargetFormat, ConfigError> {
        match self {
            Format::Bmp(_) => Ok(TargetFormat::Bmp),
            Format::Png(_) => Ok(TargetFormat::Png),
            Format::Gif(_) => Ok(TargetFormat::Gif),
            Format::Jpg { .. } => TargetFormat::jpeg(config.jpeg.quality),
        }
    }
}

/// Configuration file (or defaults) plus environment, then command line flags on top
fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    if let Some(jobs) = args.jobs {
        config.batch.jobs = jobs;
    }
    if args.force {
        config.batch.overwrite = true;
    }
    if args.no_progress {
        config.batch.progress = false;
    }
    if let Some(dir) = &args.outdir {
        config.batch.output_dir = Some(dir.clone());
    }
    if let Format::Jpg {
        quality: Some(quality),
        ..
    } = &args.format
    {
        config.jpeg.quality = *quality;
    }

    // stdout carries image data, and there is only one image
    if args.pipe {
        config.batch.jobs = 1;
        config.batch.progress = false;
    }

    Ok(config)
}

/// Log to stderr; RUST_LOG wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}

fn exit_code(outcome: BatchOutcome) -> ExitCode {
    match outcome {
        BatchOutcome::AllSucceeded => ExitCode::SUCCESS,
        BatchOutcome::PartialFailure => ExitCode::from(EXIT_PARTIAL_FAILURE),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = load_config(&args);
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log.level.as_str())
            .unwrap_or(DEFAULT_LOG_LEVEL),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let encoder: Arc<dyn FormatEncoder> = match args.format.target(&config) {
        Ok(target) => Arc::new(target),
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let controller = match BatchController::new(&config, encoder) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let files = &args.format.inputs().files;

    if args.pipe {
        if !files.is_empty() {
            warn!("file arguments are ignored with --pipe");
        }
        let outcome = controller
            .run_piped(std::io::stdin(), std::io::stdout())
            .await;
        return exit_code(outcome);
    }

    let sources = resolve_sources(files);
    match controller.run(sources).await {
        Ok(outcome) => exit_code(outcome),
        Err(BatchError::NoInputFiles) => {
            error!("no input files");
            ExitCode::from(EXIT_NO_INPUT)
        }
        Err(e @ BatchError::Config(_)) => {
            error!("{}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
