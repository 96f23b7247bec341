//! Everything a command needs once the config has been read

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blobmirror_core::journal::{JournalStats, JournalWriter};
use blobmirror_core::{
    AuditJournal, Catalog, GsutilStore, JournalSink, Settings, SyncEngine, spawn_writer,
};
use blobmirror_fs::DirectoryLayout;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::logging;

/// Loaded settings plus what is derived from them.
#[derive(Debug)]
pub struct AppContext {
    pub config_path: PathBuf,
    pub settings: Settings,
    pub layout: DirectoryLayout,
    pub catalog: Catalog,
    pub remote: GsutilStore,
    pub json: bool,
}

impl AppContext {
    /// Find and load the config, start logging into its log directory, and
    /// locate the transfer tool.
    ///
    /// # Errors
    ///
    /// Returns an error if no config is found or it does not parse, if a
    /// catalog destination escapes the base root, or if the transfer tool is
    /// not installed. A missing tool is fatal before any command runs.
    pub fn load(explicit: Option<&Path>, verbose: u8, json: bool) -> Result<Self> {
        let config_path = Settings::discover(explicit)?;
        let settings = Settings::load(&config_path)?;
        logging::init(verbose, &settings.layout().log_file_path())?;
        Self::from_settings(config_path, settings, json)
    }

    fn from_settings(config_path: PathBuf, settings: Settings, json: bool) -> Result<Self> {
        let layout = settings.layout();
        let catalog = settings.catalog()?;
        let remote = GsutilStore::locate(&settings.transfer.tool)?;
        tracing::debug!(
            config = %config_path.display(),
            entries = catalog.len(),
            tool = %remote.program().display(),
            "Configuration loaded"
        );

        Ok(Self {
            config_path,
            settings,
            layout,
            catalog,
            remote,
            json,
        })
    }

    /// Build the engine and open the journal for one run.
    pub fn start_session(&self) -> Result<Session> {
        let cancel = CancellationToken::new();
        let engine = SyncEngine::new(
            Arc::new(self.remote.clone()),
            self.layout.clone(),
            self.settings.sync_options(),
            cancel.clone(),
        )?;

        let journal = AuditJournal::open(self.layout.journal_path(), self.settings.robustness())?;
        let (sink, writer) = spawn_writer(journal);

        Ok(Session {
            engine,
            sink,
            writer,
            interrupt: watch_interrupt(cancel),
        })
    }
}

/// One run: engine, journal writer, and the Ctrl-C watcher.
pub struct Session {
    pub engine: SyncEngine,
    pub sink: JournalSink,
    writer: JournalWriter,
    interrupt: JoinHandle<()>,
}

impl Session {
    /// Stop watching for Ctrl-C and flush the journal.
    pub async fn finish(self) -> Result<JournalStats> {
        self.interrupt.abort();
        drop(self.sink);
        Ok(self.writer.finish().await?)
    }
}

fn watch_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling in-flight transfers");
            cancel.cancel();
        }
    })
}
