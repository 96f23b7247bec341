//! Error types for blobmirror-fs

use std::path::PathBuf;

/// Result type for blobmirror-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobmirror-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Path {path} escapes its root {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn moving(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Move {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
