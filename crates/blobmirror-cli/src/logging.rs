//! Console and file logging
//!
//! Two independent sinks: the console gets a level chosen by `-v` or
//! `RUST_LOG`, the log file always gets info and above from every crate
//! plus debug from blobmirror itself.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::error::{CliError, Result};

const FILE_FILTER: &str = "info,blobmirror_core=debug,blobmirror_fs=debug";

fn console_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `log_file` is opened in append mode; if it
/// cannot be opened the console sink still works.
pub fn init(verbose: u8, log_file: &Path) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level(verbose)));
    let console_layer = fmt::layer()
        .with_target(verbose > 0)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(console_filter);

    let file = log_file
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(log_file));
    let (file_layer, file_error) = match file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new(FILE_FILTER)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::user(format!("Failed to initialise logging: {e}")))?;

    if let Some(e) = file_error {
        tracing::warn!(path = %log_file.display(), error = %e, "Log file unavailable, logging to console only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(console_level(0), "info");
        assert_eq!(console_level(1), "debug");
        assert_eq!(console_level(5), "trace");
    }
}
