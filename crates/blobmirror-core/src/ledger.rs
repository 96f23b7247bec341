//! Publish ledger: what each destination looked like when it was published
//!
//! Compressed objects are published decompressed, so their on-disk size
//! says nothing about the remote size. The ledger keeps the remote size
//! observed at publish time, keyed by destination path, and is persisted as
//! TOML next to the audit journal.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::Path;

use blobmirror_fs::RobustnessConfig;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const LEDGER_VERSION: &str = "1.0";

/// Sizes recorded for one published destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub remote_size: u64,
    pub local_size: u64,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishLedger {
    /// Ledger format version for forward compatibility
    version: String,
    #[serde(default)]
    records: BTreeMap<String, PublishRecord>,
}

impl Default for PublishLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishLedger {
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION.to_string(),
            records: BTreeMap::new(),
        }
    }

    /// Load the ledger, or start an empty one if the file does not exist.
    ///
    /// Reads under a shared lock on the same sidecar that writers hold
    /// exclusively, so a concurrent save is never observed half-done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TomlDe`] when the file does not parse,
    /// [`Error::Ledger`] when it carries an unknown version, or an I/O error
    /// when it cannot be locked or read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_name)?;
        FileExt::lock_shared(&lock_file)?;

        let mut content = String::new();
        File::open(path)?.read_to_string(&mut content)?;
        let ledger: PublishLedger = toml::from_str(&content)?;
        if ledger.version != LEDGER_VERSION {
            return Err(Error::Ledger {
                message: format!(
                    "unsupported ledger version {} in {}",
                    ledger.version,
                    path.display()
                ),
            });
        }

        // Lock released when lock_file is dropped
        Ok(ledger)
    }

    /// Replace the ledger file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails. The
    /// previous file is left intact in that case.
    pub fn save(&self, path: &Path, robustness: RobustnessConfig) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        blobmirror_fs::io::write_atomic(path, content.as_bytes(), robustness)?;
        Ok(())
    }

    pub fn get(&self, destination: &Path) -> Option<&PublishRecord> {
        self.records.get(&key(destination))
    }

    pub fn record(&mut self, destination: &Path, remote_size: u64, local_size: u64) {
        self.records.insert(
            key(destination),
            PublishRecord {
                remote_size,
                local_size,
                published_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
