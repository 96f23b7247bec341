//! Shared harness for blobmirror-core integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blobmirror_core::remote::{ProbeError, TransferError};
use blobmirror_core::{
    AuditJournal, AuditRecord, Catalog, CatalogEntry, ClosurePeriod, ClosureSummary,
    RemoteLocator, RemoteObjectInfo, RemoteStore, SyncEngine, SyncOptions, SyncSummary,
    spawn_writer,
};
use blobmirror_fs::RobustnessConfig;
use blobmirror_test_utils::{FakeBucket, TestMirror};
use tokio_util::sync::CancellationToken;

/// In-process [`RemoteStore`] serving a [`FakeBucket`] directory.
pub struct BucketRemote {
    root: PathBuf,
    failing_probes: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<String>>,
    pub probes: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl BucketRemote {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            failing_probes: Mutex::default(),
            failing_fetches: Mutex::default(),
            probes: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fail_probe(&self, locator: &str) {
        self.failing_probes.lock().unwrap().insert(locator.to_string());
    }

    pub fn fail_fetch(&self, locator: &str) {
        self.failing_fetches.lock().unwrap().insert(locator.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn object_path(&self, locator: &RemoteLocator) -> PathBuf {
        let rest = locator.as_str().strip_prefix("gs://").expect("gs:// locator");
        self.root.join(rest)
    }
}

#[async_trait]
impl RemoteStore for BucketRemote {
    fn name(&self) -> &str {
        "fake-bucket"
    }

    async fn probe(&self, locator: &RemoteLocator) -> Result<RemoteObjectInfo, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.failing_probes.lock().unwrap().contains(locator.as_str()) {
            return Err(ProbeError::Other("simulated outage".into()));
        }
        match std::fs::metadata(self.object_path(locator)) {
            Ok(meta) => Ok(RemoteObjectInfo::found(meta.len())),
            Err(_) => Ok(RemoteObjectInfo::absent()),
        }
    }

    async fn fetch(&self, locator: &RemoteLocator, into: &Path) -> Result<(), TransferError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_fetches.lock().unwrap().contains(locator.as_str()) {
            // Leave partial output behind like an interrupted copy would.
            std::fs::write(into, b"partial").expect("write partial output");
            return Err(TransferError::CommandFailed {
                tool: "fake".into(),
                code: 1,
                stderr: "simulated outage".into(),
            });
        }
        std::fs::copy(self.object_path(locator), into).map_err(|source| TransferError::Io {
            path: into.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// A bucket, a mirror and a remote wired together.
pub struct Harness {
    pub bucket: FakeBucket,
    pub mirror: TestMirror,
    pub remote: Arc<BucketRemote>,
}

impl Harness {
    pub fn new() -> Self {
        let bucket = FakeBucket::new();
        let remote = Arc::new(BucketRemote::new(bucket.root()));
        Self {
            bucket,
            mirror: TestMirror::new(),
            remote,
        }
    }

    pub fn entry(&self, object: &str, destination: &str) -> CatalogEntry {
        let locator = RemoteLocator::parse(self.bucket.locator(object)).expect("valid locator");
        CatalogEntry::new(locator, self.mirror.base_root().join(destination))
    }

    pub fn engine(&self, cancel: CancellationToken) -> SyncEngine {
        SyncEngine::new(
            self.remote.clone(),
            self.mirror.layout(),
            SyncOptions::default(),
            cancel,
        )
        .expect("Should create engine")
    }

    pub fn journal(&self) -> AuditJournal {
        AuditJournal::open(self.mirror.layout().journal_path(), RobustnessConfig::default())
            .expect("Should open journal")
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.journal().read_all().expect("Should read journal")
    }

    pub async fn daily(&self, catalog: &Catalog) -> SyncSummary {
        self.daily_with(catalog, CancellationToken::new()).await
    }

    pub async fn daily_with(&self, catalog: &Catalog, cancel: CancellationToken) -> SyncSummary {
        let engine = self.engine(cancel);
        let (sink, writer) = spawn_writer(self.journal());
        let summary = engine.run_daily_sync(catalog, &sink).await;
        drop(sink);
        writer.finish().await.expect("Should flush journal");
        summary
    }

    pub async fn closure(&self, catalog: &Catalog, period: ClosurePeriod) -> ClosureSummary {
        let engine = self.engine(CancellationToken::new());
        let (sink, writer) = spawn_writer(self.journal());
        let summary = engine.run_closure_sync(catalog, period, &sink).await;
        drop(sink);
        writer.finish().await.expect("Should flush journal");
        summary
    }
}
