//! Per-entry outcomes and run summaries

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::backup::BackupRecord;
use crate::closure::ClosurePeriod;
use crate::decompress::DecompressionError;
use crate::journal::AuditAction;
use crate::remote::{ProbeError, TransferError};

/// Remote operation that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Transfer,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Probe => "probe",
            Self::Transfer => "transfer",
        })
    }
}

/// Why one entry's attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("probe failed: {0}")]
    Probe(#[source] ProbeError),

    #[error("transfer failed: {0}")]
    Transfer(#[source] TransferError),

    #[error("decompression failed: {0}")]
    Decompression(#[from] DecompressionError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] blobmirror_fs::Error),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: Stage, after: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("worker task failed: {0}")]
    Task(String),
}

impl From<ProbeError> for SyncError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::TimedOut(after) => Self::Timeout {
                stage: Stage::Probe,
                after,
            },
            ProbeError::Cancelled => Self::Cancelled,
            other => Self::Probe(other),
        }
    }
}

impl From<TransferError> for SyncError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::TimedOut(after) => Self::Timeout {
                stage: Stage::Transfer,
                after,
            },
            TransferError::Cancelled => Self::Cancelled,
            other => Self::Transfer(other),
        }
    }
}

/// Coarse failure class, stable for machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Probe,
    Transfer,
    Decompression,
    Filesystem,
    Timeout,
    Cancelled,
    Internal,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Probe(_) => FailureKind::Probe,
            Self::Transfer(_) => FailureKind::Transfer,
            Self::Decompression(_) => FailureKind::Decompression,
            Self::Filesystem(_) => FailureKind::Filesystem,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Task(_) => FailureKind::Internal,
        }
    }

    /// Journal action for this failure.
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Transfer(_)
            | Self::Timeout {
                stage: Stage::Transfer,
                ..
            } => AuditAction::TransferError(self.to_string()),
            _ => AuditAction::OtherError(self.to_string()),
        }
    }
}

/// How an entry ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    NotFound,
    Unchanged,
    Updated {
        backup: Option<BackupRecord>,
        bytes: u64,
    },
}

/// Terminal result for one entry.
#[derive(Debug)]
pub struct EntryOutcome {
    pub object_name: String,
    pub destination: PathBuf,
    pub result: Result<EntryStatus, SyncError>,
}

impl EntryOutcome {
    pub fn new(
        object_name: impl Into<String>,
        destination: impl Into<PathBuf>,
        result: Result<EntryStatus, SyncError>,
    ) -> Self {
        Self {
            object_name: object_name.into(),
            destination: destination.into(),
            result,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match &self.result {
            Ok(EntryStatus::NotFound) => "not_found",
            Ok(EntryStatus::Unchanged) => "unchanged",
            Ok(EntryStatus::Updated { .. }) => "updated",
            Err(_) => "failed",
        }
    }

    pub fn backup(&self) -> Option<&BackupRecord> {
        match &self.result {
            Ok(EntryStatus::Updated { backup, .. }) => backup.as_ref(),
            _ => None,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl Serialize for EntryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EntryOutcome", 5)?;
        state.serialize_field("object_name", &self.object_name)?;
        state.serialize_field("destination", &self.destination)?;
        state.serialize_field("status", self.status_label())?;
        match &self.result {
            Ok(EntryStatus::Updated { backup, bytes }) => {
                state.serialize_field("bytes", bytes)?;
                state.serialize_field("backup", &backup.as_ref().map(|b| &b.new_name))?;
            }
            Ok(_) => {}
            Err(e) => {
                state.serialize_field("failure", &e.kind())?;
                state.serialize_field("message", &e.to_string())?;
            }
        }
        state.end()
    }
}

/// Tally of outcomes per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SummaryCounts {
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub failed: usize,
    pub backups: usize,
}

/// Everything one run did, in catalog order.
#[derive(Debug, Default, serde::Serialize)]
pub struct SyncSummary {
    pub outcomes: Vec<EntryOutcome>,
    /// Problems after the entries finished (ledger save, staging sweep).
    pub warnings: Vec<String>,
}

impl SyncSummary {
    pub fn counts(&self) -> SummaryCounts {
        let mut counts = SummaryCounts::default();
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(EntryStatus::NotFound) => counts.not_found += 1,
                Ok(EntryStatus::Unchanged) => counts.unchanged += 1,
                Ok(EntryStatus::Updated { backup, .. }) => {
                    counts.updated += 1;
                    counts.backups += usize::from(backup.is_some());
                }
                Err(_) => counts.failed += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = (&EntryOutcome, &SyncError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn is_success(&self) -> bool {
        self.counts().failed == 0
    }
}

/// A closure run: what resolution found, then the sync of what exists.
#[derive(Debug, serde::Serialize)]
pub struct ClosureSummary {
    pub period: ClosurePeriod,
    pub tag: String,
    pub found: usize,
    pub absent: usize,
    pub sync: SyncSummary,
}

impl ClosureSummary {
    /// No closure variant existed and no probe failed.
    pub fn none_found(&self) -> bool {
        self.found == 0 && self.sync.outcomes.is_empty()
    }
}
