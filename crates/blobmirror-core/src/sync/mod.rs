//! Sync orchestration
//!
//! [`SyncEngine`] runs every catalog entry through the same state machine:
//! probe, decide, fetch into a private staging slot, decompress, rotate the
//! old destination into the backup root, publish. Entries run concurrently
//! on a bounded pool; a failing entry never stops the others.

mod engine;
mod locks;
mod outcome;
mod pipeline;

pub use engine::{SyncEngine, SyncOptions};
pub use outcome::{
    ClosureSummary, EntryOutcome, EntryStatus, FailureKind, Stage, SummaryCounts, SyncError,
    SyncSummary,
};
