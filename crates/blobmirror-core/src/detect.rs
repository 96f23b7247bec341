//! Change detection by byte size
//!
//! Size equality is the only signal. Two revisions with the same length are
//! treated as identical.

use std::path::Path;

use serde::Serialize;

use crate::ledger::PublishLedger;
use crate::remote::RemoteObjectInfo;

/// Destination as observed right before the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalDestinationState {
    pub exists: bool,
    /// Size comparable with the remote size, when one is known.
    pub size_bytes: Option<u64>,
}

impl LocalDestinationState {
    pub fn absent() -> Self {
        Self {
            exists: false,
            size_bytes: None,
        }
    }

    pub fn present(size_bytes: Option<u64>) -> Self {
        Self {
            exists: true,
            size_bytes,
        }
    }

    /// Snapshot `destination`.
    ///
    /// For compressed remotes the on-disk size can never match the remote
    /// size, so the comparable size is the remote size recorded when the file
    /// was published, as long as the file has not changed size since.
    pub fn observe(
        destination: &Path,
        compressed: bool,
        ledger: &PublishLedger,
    ) -> blobmirror_fs::Result<Self> {
        let Some(on_disk) = blobmirror_fs::io::file_size(destination)? else {
            return Ok(Self::absent());
        };
        if !compressed {
            return Ok(Self::present(Some(on_disk)));
        }

        let recorded = ledger
            .get(destination)
            .filter(|record| record.local_size == on_disk)
            .map(|record| record.remote_size);
        if recorded.is_none() {
            tracing::debug!(
                destination = %destination.display(),
                "No matching publish record for compressed object"
            );
        }
        Ok(Self::present(recorded))
    }
}

/// What the orchestrator should do with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDecision {
    NotFoundRemote,
    Unchanged,
    Update,
}

pub fn decide(remote: &RemoteObjectInfo, local: &LocalDestinationState) -> ChangeDecision {
    if !remote.exists {
        return ChangeDecision::NotFoundRemote;
    }
    if !local.exists {
        return ChangeDecision::Update;
    }
    match (local.size_bytes, remote.size_bytes) {
        (Some(local_size), Some(remote_size)) if local_size == remote_size => {
            ChangeDecision::Unchanged
        }
        _ => ChangeDecision::Update,
    }
}

/// `true` when the destination must be (re)written from the remote.
pub fn needs_update(remote: &RemoteObjectInfo, local: &LocalDestinationState) -> bool {
    decide(remote, local) == ChangeDecision::Update
}
