//! Append-only CSV audit journal
//!
//! One row per action taken on an object: `Timestamp,FileName,Action`.
//! Rows are appended under an advisory lock, so several processes can share
//! a journal. Inside one process all rows go through a single writer task
//! (see [`spawn_writer`]).

mod csv;
mod writer;

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use blobmirror_fs::RobustnessConfig;
use chrono::{Local, NaiveDateTime};
use fs2::FileExt;
use serde::Serialize;

use crate::{Error, Result};

pub use writer::{JournalSink, JournalStats, JournalWriter, spawn_writer};

pub const HEADER: [&str; 3] = ["Timestamp", "FileName", "Action"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What happened to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum AuditAction {
    NotFoundRemote,
    NoChange,
    BackupCreated,
    Updated,
    TransferError(String),
    OtherError(String),
}

impl AuditAction {
    pub fn label(&self) -> String {
        match self {
            Self::NotFoundRemote => "Not found in remote".to_string(),
            Self::NoChange => "No changes".to_string(),
            Self::BackupCreated => "Backup created".to_string(),
            Self::Updated => "Updated".to_string(),
            Self::TransferError(cause) => format!("Transfer error: {cause}"),
            Self::OtherError(cause) => format!("Error: {cause}"),
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let action = match label {
            "Not found in remote" => Self::NotFoundRemote,
            "No changes" => Self::NoChange,
            "Backup created" => Self::BackupCreated,
            "Updated" => Self::Updated,
            other => {
                if let Some(cause) = other.strip_prefix("Transfer error: ") {
                    Self::TransferError(cause.to_string())
                } else {
                    Self::OtherError(other.strip_prefix("Error: ")?.to_string())
                }
            }
        };
        Some(action)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::TransferError(_) | Self::OtherError(_))
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub timestamp: NaiveDateTime,
    pub object_name: String,
    pub action: AuditAction,
}

impl AuditRecord {
    /// A record stamped with the current local time.
    pub fn now(object_name: impl Into<String>, action: AuditAction) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            object_name: object_name.into(),
            action,
        }
    }

    fn to_row(&self) -> String {
        csv::encode_row(&[
            &self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            &self.object_name,
            &self.action.label(),
        ])
    }
}

/// The journal file.
#[derive(Debug, Clone)]
pub struct AuditJournal {
    path: PathBuf,
    robustness: RobustnessConfig,
}

impl AuditJournal {
    /// Open the journal at `path`, writing the header if the file is new.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the parent directory cannot be created or
    /// the header cannot be appended.
    pub fn open(path: impl Into<PathBuf>, robustness: RobustnessConfig) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            blobmirror_fs::io::ensure_dir(parent)?;
        }

        // Header check and write happen under the same lock every appender
        // takes, so concurrent openers write it exactly once.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| blobmirror_fs::Error::io(&path, e))?;
        FileExt::lock_exclusive(&file)?;
        if file.metadata()?.len() == 0 {
            file.write_all(csv::encode_row(&HEADER).as_bytes())?;
            tracing::debug!(path = %path.display(), "Created audit journal");
        }
        drop(file);

        Ok(Self { path, robustness })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        blobmirror_fs::io::append_locked(&self.path, record.to_row().as_bytes(), self.robustness)?;
        Ok(())
    }

    /// Every record in file order. The header row is skipped.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let content = blobmirror_fs::io::read_text(&self.path)?;
        let rows = csv::parse_rows(&content).map_err(|message| self.error(message))?;

        rows.into_iter()
            .enumerate()
            .filter(|(index, row)| !(*index == 0 && row[..] == HEADER))
            .map(|(index, row)| self.decode(index, row))
            .collect()
    }

    fn decode(&self, index: usize, row: Vec<String>) -> Result<AuditRecord> {
        let [timestamp, object_name, action]: [String; 3] = row
            .try_into()
            .map_err(|row: Vec<String>| self.error(format!("row {index} has {} fields", row.len())))?;
        let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| self.error(format!("row {index}: bad timestamp: {e}")))?;
        let action = AuditAction::parse(&action)
            .ok_or_else(|| self.error(format!("row {index}: unknown action '{action}'")))?;
        Ok(AuditRecord {
            timestamp,
            object_name,
            action,
        })
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Journal {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}
