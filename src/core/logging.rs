//! Logging initialization
//!
//! The crate logs through the `log` macros. They are bridged into `tracing`
//! with `tracing-log` and printed by a `tracing-subscriber` fmt layer, filtered
//! by `RUST_LOG` (default `info`). An optional file receives the same lines
//! without ANSI colors.

use std::fs::File;
use std::sync::Arc;

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::error::{AppError, AppResult};

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Initialize logger for console and, optionally, file output
///
/// # Arguments
/// * `log_file_path` - Path to a log file mirroring the console output
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(AppError)` - The file could not be created or a logger was already installed
pub fn init_logger(log_file_path: Option<&str>) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match log_file_path {
        Some(path) => {
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Logging(format!("Failed to install subscriber: {}", e)))?;
    LogTracer::init().map_err(|e| AppError::Logging(format!("Failed to bridge log records: {}", e)))?;

    Ok(())
}
