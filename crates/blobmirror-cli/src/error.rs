//! Error types for blobmirror-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from blobmirror-core
    #[error(transparent)]
    Core(#[from] blobmirror_core::Error),

    /// Error from blobmirror-fs
    #[error(transparent)]
    Fs(#[from] blobmirror_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Interactive prompt error
    #[error("Interactive prompt error: {0}")]
    Dialoguer(#[from] dialoguer::Error),

    /// JSON rendering error
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
