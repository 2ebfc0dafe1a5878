//! Log sinks.
//!
//! Every record goes to the run's log file at DEBUG and above. Records are
//! echoed to stderr through an `EnvFilter` (`RUST_LOG`, default `info`).

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const DEFAULT_LOG_PATH: &str = "/tmp/log/o2locktop/test.log";

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Create `path` and its parent directories, truncating an existing log.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Install the global subscriber.
pub fn init(path: &Path) -> Result<()> {
    let file = open_log_file(path)?;
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .with_filter(default_env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize logger: {err}"))
}
