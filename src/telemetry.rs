//! Log file setup

use crate::constants::logging::{DEFAULT_FILTER, FILTER_ENV};
use crate::error::AppResult;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Send tracing output to `path`. The terminal belongs to the meter, so
/// without a path nothing is logged.
pub fn init_tracing(path: Option<&Path>) -> AppResult<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!(path = %path.display(), "logging started");
    Ok(())
}
