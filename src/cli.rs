//! CLI parsing and orchestration. Parses args, converts the EPUB, writes text or JSON
//! to a file or stdout. Maps errors to exit codes.

use crate::config::{self, Config};
use crate::convert::{extract, ConvertError, ConvertOptions};
use crate::formats::{render, write_output, FormatError, OutputFormat};
use crate::model::SkippedResource;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    Config(String),

    #[error("Error converting EPUB")]
    Convert(#[from] ConvertError),

    #[error("Error writing output file")]
    Output(#[from] FormatError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::Convert(_) | CliRunError::Output(_) => 1,
            CliRunError::Config(_) => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "epub2txt")]
#[command(about = "Extract the plain text of an EPUB in reading order")]
#[command(
    after_help = "If no output file is specified, output will be printed to stdout. Config file keys (format, quiet, line_breaks, paragraph_breaks) are read from ./epub2txt.toml or the user config directory. CLI flags override config."
)]
pub struct Args {
    /// Input EPUB file.
    pub input: PathBuf,

    /// Output file. Overwritten if it exists.
    pub output: Option<PathBuf>,

    /// Output format: text or json.
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Suppress progress output and the success message (warnings and errors are still printed).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and full error chain.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "text" | "txt" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid --format value: '{}'. Use text or json.", s)),
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_filter = if verbose { "epub2txt=debug" } else { "epub2txt=warn" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn print_warning(skipped: &SkippedResource) {
    eprintln!("Warning: failed to read {}: {}", skipped.path, skipped.reason);
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config()
        .map_err(CliRunError::Config)?
        .unwrap_or_default();
    run_with_config(args, &config)
}

fn run_with_config(args: &Args, config: &Config) -> Result<(), CliRunError> {
    let format = match args.format {
        Some(f) => f,
        None => match config.format.as_deref() {
            Some(s) => parse_format(s).map_err(CliRunError::Config)?,
            None => OutputFormat::Text,
        },
    };
    let quiet = args.quiet || config.quiet.unwrap_or(false);
    let show_progress = !quiet && args.output.is_some();

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Extracting resource {}/{}", n, total));
    };

    let progress: Option<&dyn Fn(u32, u32)> = if show_progress {
        Some(&progress_cb)
    } else {
        None
    };
    let options = ConvertOptions {
        progress,
        on_warning: Some(&print_warning),
        stripper: config.stripper(),
    };
    let extraction = extract(&args.input, &options);

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }
    let extraction = extraction?;

    match &args.output {
        Some(output) => {
            write_output(&extraction, format, output)?;
            if !quiet {
                println!(
                    "Successfully converted {} to {}",
                    args.input.display(),
                    output.display()
                );
            }
        }
        None => println!("{}", render(&extraction, format)?),
    }
    Ok(())
}
