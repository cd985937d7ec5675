//! Command-line entry point for taps built on tapline.
//!
//! A tap binary builds its [`Tap`] and hands it to [`main_with`]:
//!
//! ```rust,ignore
//! fn main() -> ExitCode {
//!     match build_tap() {
//!         Ok(tap) => tapline_cli::main_with(&tap),
//!         Err(e) => tapline_cli::report(&e),
//!     }
//! }
//! ```
//!
//! stdout carries the Singer protocol, so all logging goes to stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tapline::{Catalog, Result, State, Tap, TapError};
use tracing::{info, Level};

/// Standard Singer tap arguments.
#[derive(Parser, Debug, Clone)]
#[command(about = "Singer tap")]
#[command(version)]
pub struct Args {
    /// Path to JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to JSON state file from a previous run
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Path to JSON catalog selecting the streams to sync
    #[arg(long, visible_alias = "properties")]
    pub catalog: Option<PathBuf>,

    /// Run discovery and print the catalog
    #[arg(short, long)]
    pub discover: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    pub log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub verbosity: String,
}

/// Parse arguments, set up logging and run the tap against stdout.
pub fn main_with(tap: &Tap) -> ExitCode {
    let args = Args::parse();
    setup_logging(&args.verbosity, &args.log_format);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run_tap(tap, &args, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

/// Print an error to stderr and turn it into an exit code.
pub fn report(error: &TapError) -> ExitCode {
    eprintln!("{}", error.format_detailed());
    ExitCode::from(error.exit_code())
}

/// Dispatch to discovery or sync according to `args`.
pub fn run_tap(tap: &Tap, args: &Args, out: &mut dyn Write) -> Result<()> {
    let config = args.config.as_deref().map(load_json).transpose()?;

    if args.discover {
        let catalog = tap.do_discover(config, out)?;
        info!("Wrote catalog with {} streams", catalog.len());
        return Ok(());
    }

    let catalog = args.catalog.as_deref().map(Catalog::load).transpose()?;
    let state = args.state.as_deref().map(State::load).transpose()?;

    let summary = tap.do_sync(config, catalog, state, out)?;
    info!(
        "Synced {} records across {} streams in {} ms",
        summary.total_records(),
        summary.streams.len(),
        (summary.completed_at - summary.started_at).num_milliseconds()
    );
    Ok(())
}

/// Read and parse a JSON file. Errors name the file.
pub fn load_json(path: &Path) -> Result<Value> {
    std::fs::read_to_string(path)
        .map_err(TapError::from)
        .and_then(|content| Ok(serde_json::from_str(&content)?))
        .map_err(|e| TapError::in_file(path, e))
}

/// Initialize the global subscriber, writing to stderr.
///
/// Does nothing if a subscriber is already installed.
pub fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false);

    let _ = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_args_parse_singer_flags() {
        let args = Args::try_parse_from([
            "tap",
            "--config",
            "config.json",
            "--properties",
            "catalog.json",
            "--state",
            "state.json",
        ])
        .unwrap();

        assert_eq!(args.config.as_deref(), Some(Path::new("config.json")));
        assert_eq!(args.catalog.as_deref(), Some(Path::new("catalog.json")));
        assert_eq!(args.state.as_deref(), Some(Path::new("state.json")));
        assert!(!args.discover);
        assert_eq!(args.log_format, "text");
        assert_eq!(args.verbosity, "info");
    }

    #[test]
    fn test_load_json_names_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = load_json(file.path()).unwrap_err();
        let name = file.path().display().to_string();
        assert!(err.to_string().contains(&name));

        let err = load_json(Path::new("does-not-exist.json")).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.json"));
    }
}
