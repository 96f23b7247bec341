//! Per-attempt staging directories
//!
//! Every sync attempt stages its bytes under `<root>/<uuid>/`. The directory
//! belongs to exactly one attempt and is removed when the [`StagingSlot`] is
//! dropped, whichever way the attempt ends.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{Error, Result, io};

/// Root under which attempts create their private staging directories.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a fresh staging directory for one attempt.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the slot directory cannot be created.
    pub fn begin(&self) -> Result<StagingSlot> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.simple().to_string());
        io::ensure_dir(&dir)?;
        tracing::debug!(slot = %id, dir = %dir.display(), "Opened staging slot");
        Ok(StagingSlot {
            id,
            dir,
            released: false,
        })
    }

    /// Remove attempt directories left behind by an interrupted earlier run.
    ///
    /// Only directories named like a slot are touched. Must not be called
    /// while attempts from this process are still in flight.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the root cannot be listed or a stale slot
    /// cannot be removed. A missing root counts as nothing to sweep.
    pub fn sweep(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io(&self.root, e)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_slot = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| Uuid::try_parse(n).is_ok());
            if is_slot {
                fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, root = %self.root.display(), "Swept stale staging slots");
        }
        Ok(removed)
    }
}

/// A private staging directory owned by a single attempt.
#[derive(Debug)]
pub struct StagingSlot {
    id: Uuid,
    dir: PathBuf,
    released: bool,
}

impl StagingSlot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside this slot.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Remove the slot now and report failures instead of swallowing them.
    pub fn discard(mut self) -> Result<()> {
        self.released = true;
        remove_slot_dir(&self.dir)
    }
}

impl Drop for StagingSlot {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_slot_dir(&self.dir) {
            tracing::warn!(slot = %self.id, error = %e, "Failed to remove staging slot");
        }
    }
}

fn remove_slot_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(dir, e)),
    }
}
