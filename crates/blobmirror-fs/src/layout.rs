//! Directory layout of a mirror
//!
//! A mirror has four roots: the base root holding published destinations,
//! the backup root receiving rotated files, the staging root for in-flight
//! attempts and the log directory for the journal, ledger and log file.

use std::path::{Component, Path, PathBuf};

use crate::staging::StagingArea;
use crate::{Error, Result, io};

const STAGING_DIR: &str = "Temp";
const LOG_DIR: &str = "Logs";
const JOURNAL_FILE: &str = "audit.csv";
const LEDGER_FILE: &str = "publish-ledger.toml";
const LOG_FILE: &str = "blobmirror.log";

/// Resolved directory layout of a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    base_root: PathBuf,
    backup_root: PathBuf,
    staging_root: PathBuf,
    log_dir: PathBuf,
}

impl DirectoryLayout {
    /// Layout with staging and logs placed under the backup root.
    pub fn new(base_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        let backup_root = backup_root.into();
        Self {
            base_root: base_root.into(),
            staging_root: backup_root.join(STAGING_DIR),
            log_dir: backup_root.join(LOG_DIR),
            backup_root,
        }
    }

    pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = staging_root.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn base_root(&self) -> &Path {
        &self.base_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn journal_path(&self) -> PathBuf {
        self.log_dir.join(JOURNAL_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.log_dir.join(LEDGER_FILE)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }

    pub fn staging(&self) -> StagingArea {
        StagingArea::new(&self.staging_root)
    }

    /// Create every root that does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.base_root,
            &self.backup_root,
            &self.staging_root,
            &self.log_dir,
        ] {
            io::ensure_dir(dir)?;
        }
        Ok(())
    }

    /// Resolve a catalog destination against the base root.
    ///
    /// Absolute paths are kept as they are. Relative paths may not climb out
    /// of the base root with `..`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathEscape`] when a relative destination leaves the
    /// base root.
    pub fn resolve_destination(&self, destination: &Path) -> Result<PathBuf> {
        if destination.is_absolute() {
            return Ok(destination.to_path_buf());
        }
        if destination
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(Error::PathEscape {
                path: destination.to_path_buf(),
                root: self.base_root.clone(),
            });
        }
        Ok(self.base_root.join(destination))
    }
}
