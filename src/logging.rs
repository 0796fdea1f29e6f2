//! Logger setup
//!
//! Always logs to stderr. With `debug_to_file` set, the same records are
//! appended to `debug.log` in the user's data directory so they can be
//! looked at later (`pointer-switch devices` prints the tail).

use crate::settings::APP_NAME;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Subscriber, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE: &str = "debug.log";

/// `~/.local/share/pointer-switch/debug.log`
pub fn log_file_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Could not find data directory")?
        .join(APP_NAME);
    Ok(data_dir.join(LOG_FILE))
}

/// Open `path` for appending, creating its directory first
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {:?}", parent))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {:?}", path))
}

/// stderr output, plus `file` when given, filtered to `level`
pub fn subscriber(level: LevelFilter, file: Option<File>) -> impl Subscriber + Send + Sync {
    let file_layer = file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(level)
}

/// Install the global logger
pub fn init(debug: bool, to_file: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let mut file_error = None;
    let file = if to_file {
        match log_file_path().and_then(|path| open_log_file(&path)) {
            Ok(file) => Some(file),
            Err(e) => {
                file_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    if let Err(e) = subscriber(level, file).try_init() {
        eprintln!("Failed to install logger: {}", e);
        return;
    }
    if let Some(e) = file_error {
        warn!("Logging to stderr only: {:#}", e);
    }
}

/// Last `lines` lines of the log file, `None` if there is nothing to show
pub fn tail(path: &Path, lines: usize) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let all: Vec<&str> = content.lines().collect();
    if all.is_empty() {
        return None;
    }
    let start = all.len().saturating_sub(lines);
    Some(all[start..].join("\n"))
}
