//! The per-entry state machine

use std::path::Path;
use std::sync::Arc;

use super::engine::EngineShared;
use super::outcome::{EntryOutcome, EntryStatus, SyncError};
use crate::catalog::CatalogEntry;
use crate::decompress;
use crate::detect::{ChangeDecision, LocalDestinationState, decide};
use crate::journal::{AuditAction, JournalSink};
use crate::publish::publish;
use crate::remote::RemoteStore;

impl EngineShared {
    /// Run one entry to a terminal state and journal that state.
    pub(super) async fn sync_entry(
        self: &Arc<Self>,
        entry: &CatalogEntry,
        journal: &JournalSink,
    ) -> EntryOutcome {
        let destination = entry.destination_path();
        let result = self.attempt(entry, &destination, journal).await;

        match &result {
            Ok(EntryStatus::NotFound) => {
                journal.record(entry.object_name(), AuditAction::NotFoundRemote);
            }
            Ok(EntryStatus::Unchanged) => {
                journal.record(entry.object_name(), AuditAction::NoChange);
            }
            Ok(EntryStatus::Updated { .. }) => {
                journal.record(entry.destination_file_name(), AuditAction::Updated);
            }
            Err(e) => {
                tracing::error!(object = %entry.object_name(), error = %e, "Sync failed");
                journal.record(entry.object_name(), e.audit_action());
            }
        }

        EntryOutcome::new(entry.object_name(), destination, result)
    }

    async fn attempt(
        self: &Arc<Self>,
        entry: &CatalogEntry,
        destination: &Path,
        journal: &JournalSink,
    ) -> Result<EntryStatus, SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let _destination_guard = self.locks.acquire(destination).await;
        let object = entry.object_name();
        tracing::info!(object = %object, "Processing");

        // Probing
        let remote = self.remote.probe(entry.remote_locator()).await?;
        let local = {
            let ledger = self.ledger();
            LocalDestinationState::observe(destination, entry.is_compressed(), &ledger)?
        };

        // Deciding
        match decide(&remote, &local) {
            ChangeDecision::NotFoundRemote => {
                tracing::info!(object = %object, "Not found in remote");
                return Ok(EntryStatus::NotFound);
            }
            ChangeDecision::Unchanged => {
                tracing::info!(object = %object, "No changes");
                return Ok(EntryStatus::Unchanged);
            }
            ChangeDecision::Update => {
                tracing::debug!(
                    object = %object,
                    remote_size = ?remote.size_bytes,
                    local_size = ?local.size_bytes,
                    "Update needed"
                );
            }
        }

        // Transferring
        let slot = self.staging.begin()?;
        let staged = slot.path_for(object);
        tracing::info!(
            object = %object,
            slot = %slot.id(),
            staged = %staged.display(),
            "Downloading"
        );
        self.remote.fetch(entry.remote_locator(), &staged).await?;

        // Decompressing
        let final_name = entry.destination_file_name();
        let compressed = entry.is_compressed();
        let materialized = blocking(move || {
            decompress::materialize(&staged, &final_name, compressed).map_err(SyncError::from)
        })
        .await?;

        // Past this point the destination is about to change; stop here if
        // the run was cancelled meanwhile.
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Rotating
        let backup = {
            let shared = Arc::clone(self);
            let destination = destination.to_path_buf();
            blocking(move || shared.rotator.rotate(&destination).map_err(SyncError::from)).await?
        };
        if let Some(record) = &backup {
            journal.record(&record.new_name, AuditAction::BackupCreated);
        }

        // Publishing
        let bytes = {
            let destination = destination.to_path_buf();
            let robustness = self.robustness;
            blocking(move || {
                let bytes = blobmirror_fs::io::file_size(&materialized)?.unwrap_or(0);
                publish(&materialized, &destination, robustness)?;
                Ok(bytes)
            })
            .await?
        };

        self.ledger()
            .record(destination, remote.size_bytes.unwrap_or(bytes), bytes);
        if let Err(e) = slot.discard() {
            tracing::warn!(object = %object, error = %e, "Failed to remove staging slot");
        }
        tracing::info!(
            object = %object,
            destination = %destination.display(),
            bytes,
            "Updated"
        );

        Ok(EntryStatus::Updated { backup, bytes })
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?
}
