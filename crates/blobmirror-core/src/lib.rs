//! Sync and versioning engine for blobmirror
//!
//! Mirrors a fixed catalog of remote objects into a local directory tree.
//! Each object is probed, compared by size with its destination, fetched
//! into a private staging slot, decompressed when gzipped, and published
//! with one rename after the previous version is moved into the backup
//! root. Every action lands in an append-only CSV journal.
//!
//! Closure runs look for period-specific variants of catalog entries (see
//! [`closure`]) and publish the ones that exist into month subfolders.

pub mod backup;
pub mod catalog;
pub mod closure;
pub mod decompress;
pub mod detect;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod publish;
pub mod remote;
pub mod settings;
pub mod sync;

pub use backup::{BackupRecord, BackupRotator};
pub use catalog::{Catalog, CatalogEntry, DailyProfile, RemoteLocator};
pub use closure::{ClosurePeriod, ClosureResolution, ClosureTask, resolve_closure_entries};
pub use detect::{ChangeDecision, LocalDestinationState, decide, needs_update};
pub use error::{Error, Result};
pub use journal::{AuditAction, AuditJournal, AuditRecord, JournalSink, spawn_writer};
pub use ledger::{PublishLedger, PublishRecord};
pub use remote::{GsutilStore, RemoteObjectInfo, RemoteStore};
pub use settings::Settings;
pub use sync::{ClosureSummary, EntryOutcome, EntryStatus, SyncEngine, SyncError, SyncOptions, SyncSummary};
