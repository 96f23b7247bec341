//! The sync engine and its run entry points

use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use blobmirror_fs::{DirectoryLayout, RobustnessConfig, StagingArea};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::locks::DestinationLocks;
use super::outcome::{ClosureSummary, EntryOutcome, SyncError, SyncSummary};
use crate::Result;
use crate::backup::BackupRotator;
use crate::catalog::{Catalog, CatalogEntry};
use crate::closure::{ClosurePeriod, resolve_closure_entries};
use crate::journal::JournalSink;
use crate::ledger::PublishLedger;
use crate::remote::{GuardedRemote, RemoteStore};

/// Knobs for one engine.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Entries processed concurrently.
    pub workers: usize,
    pub probe_timeout: Duration,
    pub transfer_timeout: Duration,
    pub robustness: RobustnessConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            probe_timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(3600),
            robustness: RobustnessConfig::default(),
        }
    }
}

/// State shared by every in-flight attempt.
pub(super) struct EngineShared {
    pub(super) remote: GuardedRemote,
    pub(super) staging: StagingArea,
    pub(super) rotator: BackupRotator,
    pub(super) ledger: std::sync::Mutex<PublishLedger>,
    pub(super) locks: DestinationLocks,
    pub(super) robustness: RobustnessConfig,
    pub(super) cancel: CancellationToken,
}

impl EngineShared {
    pub(super) fn ledger(&self) -> MutexGuard<'_, PublishLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs catalogs against a remote store and a directory layout.
pub struct SyncEngine {
    shared: Arc<EngineShared>,
    layout: DirectoryLayout,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create the layout's directories and load the publish ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if a root cannot be created or the ledger cannot
    /// be loaded.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        layout: DirectoryLayout,
        options: SyncOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        layout.ensure()?;
        let ledger = PublishLedger::load(&layout.ledger_path())?;
        tracing::debug!(
            remote = remote.name(),
            workers = options.workers,
            records = ledger.len(),
            "Sync engine ready"
        );

        let shared = EngineShared {
            remote: GuardedRemote::new(
                remote,
                options.probe_timeout,
                options.transfer_timeout,
                cancel.clone(),
            ),
            staging: layout.staging(),
            rotator: BackupRotator::new(layout.backup_root(), options.robustness),
            ledger: std::sync::Mutex::new(ledger),
            locks: DestinationLocks::default(),
            robustness: options.robustness,
            cancel,
        };

        Ok(Self {
            shared: Arc::new(shared),
            layout,
            options,
        })
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Sync every entry of `catalog`, typically the daily view.
    pub async fn run_daily_sync(&self, catalog: &Catalog, journal: &JournalSink) -> SyncSummary {
        tracing::info!(entries = catalog.len(), "Starting daily sync");
        let outcomes = self.run_entries(catalog.entries().to_vec(), journal).await;
        let summary = self.finish_run(outcomes);
        log_counts(&summary);
        summary
    }

    /// Sync the closure variant of every entry that exists for `period`.
    pub async fn run_closure_sync(
        &self,
        catalog: &Catalog,
        period: ClosurePeriod,
        journal: &JournalSink,
    ) -> ClosureSummary {
        tracing::info!(period = %period, tag = %period.tag(), "Looking for closures");
        let resolution = resolve_closure_entries(catalog, &period, &self.shared.remote).await;

        let mut outcomes = Vec::with_capacity(resolution.tasks.len() + resolution.failures.len());
        for failure in resolution.failures {
            let error = SyncError::from(failure.error);
            journal.record(failure.entry.object_name(), error.audit_action());
            outcomes.push(EntryOutcome::new(
                failure.entry.object_name(),
                failure.entry.destination_path(),
                Err(error),
            ));
        }

        let found = resolution.tasks.len();
        if found == 0 {
            tracing::info!(period = %period, "No closures found");
        }
        let entries = resolution.tasks.into_iter().map(|task| task.entry).collect();
        outcomes.extend(self.run_entries(entries, journal).await);

        let sync = self.finish_run(outcomes);
        log_counts(&sync);
        ClosureSummary {
            period,
            tag: period.tag(),
            found,
            absent: resolution.absent.len(),
            sync,
        }
    }

    /// Semaphore-gated spawning: the loop waits for a permit before each
    /// spawn, so at most `workers` attempts are in flight.
    async fn run_entries(
        &self,
        entries: Vec<CatalogEntry>,
        journal: &JournalSink,
    ) -> Vec<EntryOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            let permit = Arc::clone(&semaphore).acquire_owned().await;
            let shared = Arc::clone(&self.shared);
            let journal = journal.clone();
            let object_name = entry.object_name().to_string();
            let destination = entry.destination_path();
            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so the permit is always Ok.
                let _permit = permit.ok();
                shared.sync_entry(&entry, &journal).await
            });
            handles.push((object_name, destination, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (object_name, destination, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(object = %object_name, error = %e, "Sync task aborted");
                    let error = SyncError::Task(e.to_string());
                    journal.record(&object_name, error.audit_action());
                    EntryOutcome::new(object_name, destination, Err(error))
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Persist the ledger and clear staging leftovers. Problems here are
    /// reported on the summary; the entries themselves already finished.
    fn finish_run(&self, outcomes: Vec<EntryOutcome>) -> SyncSummary {
        let mut warnings = Vec::new();

        let ledger = self.shared.ledger().clone();
        if let Err(e) = ledger.save(&self.layout.ledger_path(), self.options.robustness) {
            tracing::warn!(error = %e, "Failed to save publish ledger");
            warnings.push(format!("publish ledger not saved: {e}"));
        }

        if let Err(e) = self.shared.staging.sweep() {
            tracing::warn!(error = %e, "Failed to sweep staging area");
            warnings.push(format!("staging area not swept: {e}"));
        }

        SyncSummary { outcomes, warnings }
    }
}

fn log_counts(summary: &SyncSummary) {
    let counts = summary.counts();
    tracing::info!(
        updated = counts.updated,
        unchanged = counts.unchanged,
        not_found = counts.not_found,
        failed = counts.failed,
        backups = counts.backups,
        "Sync finished"
    );
}
