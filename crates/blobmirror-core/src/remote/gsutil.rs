//! [`RemoteStore`] backed by the `gsutil` command line tool

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::{ProbeError, RemoteObjectInfo, RemoteStore, TransferError};
use crate::catalog::RemoteLocator;
use crate::Error;

/// Markers gsutil prints on stderr when a URL has no matching object.
const NO_MATCH_MARKERS: [&str; 2] = ["matched no objects", "No URLs matched"];

/// Runs `gsutil ls -l` to probe and `gsutil cp` to fetch.
#[derive(Debug, Clone)]
pub struct GsutilStore {
    program: PathBuf,
    label: String,
}

impl GsutilStore {
    pub const DEFAULT_TOOL: &'static str = "gsutil";

    /// Find `tool` on `PATH` (or accept it as a path) and fail fast if it is
    /// not there.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ToolUnavailable`] when `tool` cannot be found.
    pub fn locate(tool: &str) -> crate::Result<Self> {
        let program = which::which(tool).map_err(|e| {
            tracing::debug!(tool, error = %e, "Transfer tool lookup failed");
            Error::ToolUnavailable {
                tool: tool.to_string(),
            }
        })?;
        tracing::debug!(tool, program = %program.display(), "Located transfer tool");
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let label = program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| Self::DEFAULT_TOOL.to_string());
        Self { program, label }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool to completion. Dropping the future kills the child.
    async fn run<I, S>(&self, args: I) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

#[async_trait]
impl RemoteStore for GsutilStore {
    fn name(&self) -> &str {
        &self.label
    }

    async fn probe(&self, locator: &RemoteLocator) -> Result<RemoteObjectInfo, ProbeError> {
        let output = self
            .run(["ls", "-l", locator.as_str()])
            .await
            .map_err(|source| ProbeError::Spawn {
                tool: self.label.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if NO_MATCH_MARKERS.iter().any(|m| stderr.contains(m)) {
                tracing::debug!(locator = %locator, "Remote object not found");
                return Ok(RemoteObjectInfo::absent());
            }
            return Err(ProbeError::CommandFailed {
                tool: self.label.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        match parse_listing(&stdout, locator.as_str()) {
            Some(size) => Ok(RemoteObjectInfo::found(size)),
            None => {
                tracing::warn!(locator = %locator, "Listing had no size for object, treating as absent");
                Ok(RemoteObjectInfo::absent())
            }
        }
    }

    async fn fetch(&self, locator: &RemoteLocator, into: &Path) -> Result<(), TransferError> {
        let output = self
            .run([OsStr::new("cp"), OsStr::new(locator.as_str()), into.as_os_str()])
            .await
            .map_err(|source| TransferError::Spawn {
                tool: self.label.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TransferError::CommandFailed {
                tool: self.label.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !into.is_file() {
            return Err(TransferError::MissingOutput {
                path: into.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Extract the byte size of `locator` from `gsutil ls -l` output.
///
/// The size is the first token of the line naming the object. A line whose
/// last token is exactly the locator wins over one that merely contains it,
/// so `FOO.csv` is not confused with `FOO.csv.gz`.
pub fn parse_listing(stdout: &str, locator: &str) -> Option<u64> {
    let candidates: Vec<Vec<&str>> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("TOTAL:") && line.contains(locator))
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|parts| parts.len() >= 3)
        .collect();

    let exact = candidates
        .iter()
        .find(|parts| parts.last() == Some(&locator));
    exact
        .or_else(|| candidates.first())
        .and_then(|parts| parts[0].parse().ok())
}
