//! The single writer task that owns journal appends for a process

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AuditAction, AuditJournal, AuditRecord};
use crate::{Error, Result};

/// Cheap, cloneable handle used by sync tasks to record actions.
#[derive(Debug, Clone)]
pub struct JournalSink {
    tx: mpsc::UnboundedSender<AuditRecord>,
}

impl JournalSink {
    /// A sink whose records are delivered to the returned receiver instead
    /// of a file.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuditRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn record(&self, object_name: impl Into<String>, action: AuditAction) {
        self.submit(AuditRecord::now(object_name, action));
    }

    pub fn submit(&self, record: AuditRecord) {
        if let Err(e) = self.tx.send(record) {
            tracing::error!(
                object = %e.0.object_name,
                action = %e.0.action,
                "Audit journal writer has stopped, record dropped"
            );
        }
    }
}

/// Rows written and rows that failed to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    pub written: usize,
    pub failed: usize,
}

/// Handle to the writer task.
#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    handle: JoinHandle<JournalStats>,
}

impl JournalWriter {
    /// Wait until every record sent before the last sink was dropped is on
    /// disk.
    pub async fn finish(self) -> Result<JournalStats> {
        let stats = self.handle.await.map_err(|e| Error::Journal {
            path: self.path.clone(),
            message: format!("writer task failed: {e}"),
        })?;
        if stats.failed > 0 {
            tracing::warn!(failed = stats.failed, "Some audit records could not be written");
        }
        Ok(stats)
    }
}

/// Start the writer task for `journal`.
///
/// The task drains records in arrival order and exits once every
/// [`JournalSink`] clone has been dropped.
pub fn spawn_writer(journal: AuditJournal) -> (JournalSink, JournalWriter) {
    let (sink, mut rx) = JournalSink::channel();
    let path = journal.path().to_path_buf();
    let handle = tokio::task::spawn_blocking(move || {
        let mut stats = JournalStats::default();
        while let Some(record) = rx.blocking_recv() {
            match journal.append(&record) {
                Ok(()) => stats.written += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        object = %record.object_name,
                        error = %e,
                        "Failed to append audit record"
                    );
                }
            }
        }
        stats
    });
    (sink, JournalWriter { path, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobmirror_fs::RobustnessConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = JournalSink::channel();
        sink.record("A.csv", AuditAction::NoChange);
        sink.record("B.csv", AuditAction::Updated);
        drop(sink);

        let mut names = Vec::new();
        while let Some(record) = rx.recv().await {
            names.push(record.object_name);
        }
        assert_eq!(names, ["A.csv", "B.csv"]);
    }

    #[tokio::test]
    async fn writer_flushes_everything_before_finishing() {
        let dir = TempDir::new().unwrap();
        let journal =
            AuditJournal::open(dir.path().join("audit.csv"), RobustnessConfig::default()).unwrap();
        let (sink, writer) = spawn_writer(journal.clone());

        for i in 0..20 {
            sink.record(format!("F{i}.csv"), AuditAction::NoChange);
        }
        drop(sink);

        let stats = writer.finish().await.unwrap();
        assert_eq!(stats, JournalStats { written: 20, failed: 0 });
        assert_eq!(journal.read_all().unwrap().len(), 20);
    }
}
