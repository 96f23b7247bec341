//! [`TestMirror`]: a temporary base/backup tree for sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use blobmirror_fs::DirectoryLayout;
use tempfile::TempDir;

/// A temporary mirror with `base/` and `backup/` roots.
pub struct TestMirror {
    temp_dir: TempDir,
}

impl Default for TestMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl TestMirror {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("TestMirror: failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn base_root(&self) -> PathBuf {
        self.root().join("base")
    }

    pub fn backup_root(&self) -> PathBuf {
        self.root().join("backup")
    }

    /// Layout with staging and logs under the backup root.
    pub fn layout(&self) -> DirectoryLayout {
        DirectoryLayout::new(self.base_root(), self.backup_root())
    }

    /// Pre-populate a destination file relative to the base root.
    pub fn write_destination(&self, rel: &str, bytes: &[u8]) {
        let path = self.base_root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("TestMirror: mkdir failed");
        }
        fs::write(path, bytes).expect("TestMirror: write failed");
    }

    /// Read a destination file relative to the base root.
    pub fn read_destination(&self, rel: &str) -> Option<Vec<u8>> {
        fs::read(self.base_root().join(rel)).ok()
    }

    /// File names in the backup root (directories excluded), sorted.
    pub fn backup_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.backup_root())
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().is_file())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Entries still present under the staging root.
    pub fn staging_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.layout().staging_root())
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Raw journal lines, header included.
    pub fn journal_lines(&self) -> Vec<String> {
        fs::read_to_string(self.layout().journal_path())
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
