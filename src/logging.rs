//! Log sink setup for the `retail-etl` binary
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{EtlError, EtlResult};

/// Build the level filter from `RUST_LOG`, falling back to `info` (or `debug`
/// when verbose)
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber: an append-only file at `log_file_path`
/// plus a console layer on stderr.
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the life of the process.
pub fn init_logging(log_file_path: &Path, verbose: bool) -> EtlResult<WorkerGuard> {
    let file_name = log_file_path.file_name().ok_or_else(|| {
        EtlError::InvalidConfig(format!(
            "log_file_path {} does not name a file",
            log_file_path.display()
        ))
    })?;
    let dir = match log_file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(non_blocking_writer);

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| EtlError::InvalidConfig(format!("logging already initialized: {e}")))?;

    Ok(guard)
}
