//! Diagnostic logging setup.
//!
//! Logs go to a file and never to the terminal, where they would interleave
//! with streamed model output.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "PROMPTLINE_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "debug";

/// Installs the global `tracing` subscriber.
///
/// With no `log_file` nothing is installed and every event is discarded.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(format!("cannot open log file {}: {e}", path.display()), e))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::config(format!("failed to initialize tracing subscriber: {e}")))?;
    tracing::debug!(path = %path.display(), "logging initialized");
    Ok(())
}
