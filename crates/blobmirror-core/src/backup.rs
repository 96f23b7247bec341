//! Backup rotation of destinations about to be overwritten

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use blobmirror_fs::{Error, RobustnessConfig, io};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One destination moved aside before an overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub original_name: String,
    pub timestamp: String,
    pub new_name: String,
    pub path: PathBuf,
}

/// Moves existing destinations into a flat backup directory.
///
/// Name selection and the move happen under one lock so two rotations in
/// the same second never pick the same backup name.
#[derive(Debug)]
pub struct BackupRotator {
    backup_root: PathBuf,
    robustness: RobustnessConfig,
    naming: Mutex<()>,
}

impl BackupRotator {
    pub fn new(backup_root: impl Into<PathBuf>, robustness: RobustnessConfig) -> Self {
        Self {
            backup_root: backup_root.into(),
            robustness,
            naming: Mutex::new(()),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Move `destination` aside. `None` when there is nothing to back up.
    ///
    /// # Errors
    ///
    /// Returns the move error when the existing file cannot be moved into
    /// the backup root. The destination is left in place.
    pub fn rotate(&self, destination: &Path) -> blobmirror_fs::Result<Option<BackupRecord>> {
        self.rotate_at(destination, Local::now().naive_local())
    }

    pub fn rotate_at(
        &self,
        destination: &Path,
        now: NaiveDateTime,
    ) -> blobmirror_fs::Result<Option<BackupRecord>> {
        if io::file_size(destination)?.is_none() {
            return Ok(None);
        }

        let original_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::io(
                    destination,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
                )
            })?;
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

        let _naming = self
            .naming
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        io::ensure_dir(&self.backup_root)?;

        let mut attempt = 0;
        let (new_name, path) = loop {
            let name = backup_name(destination, &timestamp, attempt);
            let path = self.backup_root.join(&name);
            if !path.exists() {
                break (name, path);
            }
            attempt += 1;
        };

        io::move_atomic(destination, &path, self.robustness)?;
        tracing::info!(
            original = %original_name,
            backup = %new_name,
            "Created backup"
        );

        Ok(Some(BackupRecord {
            original_name,
            timestamp,
            new_name,
            path,
        }))
    }
}

/// `<stem>_backup_<timestamp>[_<n>]<ext>`
fn backup_name(destination: &Path, timestamp: &str, attempt: u32) -> String {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    if attempt == 0 {
        format!("{stem}_backup_{timestamp}{extension}")
    } else {
        format!("{stem}_backup_{timestamp}_{attempt}{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(8, 30, 5)
            .unwrap()
    }

    #[test]
    fn backup_name_keeps_extension() {
        assert_eq!(
            backup_name(Path::new("/b/FOO.csv"), "20240315_083005", 0),
            "FOO_backup_20240315_083005.csv"
        );
        assert_eq!(
            backup_name(Path::new("/b/FOO.csv"), "20240315_083005", 2),
            "FOO_backup_20240315_083005_2.csv"
        );
        assert_eq!(
            backup_name(Path::new("/b/README"), "20240315_083005", 0),
            "README_backup_20240315_083005"
        );
    }

    #[test]
    fn rotate_moves_destination_into_backup_root() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("base/FOO.csv");
        std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
        std::fs::write(&destination, b"old").unwrap();

        let rotator = BackupRotator::new(dir.path().join("backup"), RobustnessConfig::default());
        let record = rotator.rotate_at(&destination, at()).unwrap().unwrap();

        assert_eq!(record.original_name, "FOO.csv");
        assert_eq!(record.timestamp, "20240315_083005");
        assert_eq!(record.new_name, "FOO_backup_20240315_083005.csv");
        assert!(!destination.exists());
        assert_eq!(std::fs::read(&record.path).unwrap(), b"old");
    }

    #[test]
    fn same_second_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let rotator = BackupRotator::new(dir.path().join("backup"), RobustnessConfig::default());

        let first = dir.path().join("a/FOO.csv");
        let second = dir.path().join("b/FOO.csv");
        for (path, bytes) in [(&first, b"one"), (&second, b"two")] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }

        let a = rotator.rotate_at(&first, at()).unwrap().unwrap();
        let b = rotator.rotate_at(&second, at()).unwrap().unwrap();
        assert_eq!(a.new_name, "FOO_backup_20240315_083005.csv");
        assert_eq!(b.new_name, "FOO_backup_20240315_083005_1.csv");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"two");
    }

    #[test]
    fn missing_destination_is_not_rotated() {
        let dir = TempDir::new().unwrap();
        let rotator = BackupRotator::new(dir.path().join("backup"), RobustnessConfig::default());
        assert_eq!(rotator.rotate(&dir.path().join("nope.csv")).unwrap(), None);
        assert!(!dir.path().join("backup").exists());
    }
}
