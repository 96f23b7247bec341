//! Remote object stores
//!
//! [`RemoteStore`] is the seam between the sync engine and whatever actually
//! talks to the bucket. [`GsutilStore`] drives the `gsutil` command line
//! tool; [`GuardedRemote`] wraps any store with timeouts and cancellation.

mod guard;
mod gsutil;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::catalog::RemoteLocator;

pub use guard::GuardedRemote;
pub use gsutil::{GsutilStore, parse_listing};

/// Existence and size of a remote object at probe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemoteObjectInfo {
    pub exists: bool,
    pub size_bytes: Option<u64>,
}

impl RemoteObjectInfo {
    pub fn found(size_bytes: u64) -> Self {
        Self {
            exists: true,
            size_bytes: Some(size_bytes),
        }
    }

    pub fn absent() -> Self {
        Self {
            exists: false,
            size_bytes: None,
        }
    }
}

/// A probe could not determine whether the object exists.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{tool} exited with code {code}: {stderr}")]
    CommandFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("probe cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Fetching an object's bytes failed.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{tool} exited with code {code}: {stderr}")]
    CommandFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer produced no file at {path}")]
    MissingOutput { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("transfer cancelled")]
    Cancelled,
}

/// Something that can answer "does this object exist" and fetch it.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Look up existence and size. Absence is `Ok` with `exists == false`.
    async fn probe(&self, locator: &RemoteLocator) -> Result<RemoteObjectInfo, ProbeError>;

    /// Copy the whole object to `into`. Partial output may be left behind on
    /// failure; callers own the directory it lives in.
    async fn fetch(&self, locator: &RemoteLocator, into: &Path) -> Result<(), TransferError>;
}
