//! Error types for blobmirror-core

use std::path::PathBuf;

/// Result type for blobmirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobmirror-core operations
///
/// Per-entry sync failures are not represented here: they are captured as
/// [`SyncError`](crate::sync::SyncError) at the entry boundary and never
/// abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The external transfer tool could not be located
    #[error("Transfer tool '{tool}' not found. Install it or set transfer.tool in the config.")]
    ToolUnavailable { tool: String },

    /// User-supplied input failed validation
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A remote locator could not be parsed
    #[error("Invalid remote locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// Configuration file not found at any expected path
    #[error("Configuration not found (looked in: {})", display_paths(.searched))]
    ConfigNotFound { searched: Vec<PathBuf> },

    /// Error in audit journal operations
    #[error("Journal error at {path}: {message}")]
    Journal { path: PathBuf, message: String },

    /// Error in publish ledger operations
    #[error("Ledger error: {message}")]
    Ledger { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from blobmirror-fs
    #[error(transparent)]
    Fs(#[from] blobmirror_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
