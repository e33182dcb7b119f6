use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::domain::SVError;

const DEFAULT_FILTER: &str = "sv=info";

/// Sends all tracing output to `log_file`; the terminal belongs to the UI.
/// `RUST_LOG` overrides the default filter.
pub fn init(log_file: &Path) -> Result<(), SVError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| SVError::LoggingFailed(e.to_string()))
}
