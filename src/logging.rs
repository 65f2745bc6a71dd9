//! Logging setup for the command line tool.
//!
//! The `--log` option selects where tracing output goes:
//! - `0`/`off` - no logging
//! - `1`/`stdout` - standard output
//! - `2`/`stderr` - standard error (default)
//! - `build` - a timestamped build log under `logs/`, named after the
//!   registered config-file-name stems
//! - anything else - a file opened in append mode

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Directory build logs are written to, relative to the working directory.
pub const BUILD_LOG_DIR: &str = "logs";

/// Where log output is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    Build,
    File(PathBuf),
}

impl LogTarget {
    pub fn parse(value: &str) -> Self {
        match value {
            "0" | "off" => Self::Off,
            "1" | "stdout" => Self::Stdout,
            "2" | "stderr" => Self::Stderr,
            "build" => Self::Build,
            filename => Self::File(PathBuf::from(filename)),
        }
    }
}

/// Path of a build log: `<dir>/<name>-buildLog-<timestamp>.log`.
///
/// The timestamp has millisecond resolution so consecutive runs do not
/// share a file. Slashes in the name become `_` so the log stays in `dir`.
pub fn build_log_path(dir: &Path, log_file_name: &str, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}-buildLog-{}.log",
        log_file_name.replace('/', "_"),
        now.format("%Y-%m-%d-%H-%M-%S-%3f")
    ))
}

/// Install the global tracing subscriber.
///
/// Returns the file being written to, if any.
pub fn init_logging(target: &LogTarget, verbose: bool, log_file_name: &str) -> Result<Option<PathBuf>> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    match target {
        LogTarget::Off => Ok(None),
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(None)
        }
        LogTarget::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(None)
        }
        LogTarget::Build => {
            let dir = Path::new(BUILD_LOG_DIR);
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let path = build_log_path(dir, log_file_name, Local::now());
            init_file_logging(&path, level)?;
            Ok(Some(path))
        }
        LogTarget::File(path) => {
            init_file_logging(path, level)?;
            Ok(Some(path.clone()))
        }
    }
}

fn init_file_logging(path: &Path, level: Level) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(file)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
