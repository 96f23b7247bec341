//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use uuid::Uuid;

use crate::{Error, Result};

/// Tuning knobs for locked and atomic writes.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// How long to keep retrying an advisory lock before giving up.
    pub lock_timeout: Duration,
    /// Whether to fsync file contents before they become visible.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            enable_fsync: true,
        }
    }
}

/// How a file ended up at its new location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// A single rename on the same volume.
    Renamed,
    /// Copied to a sibling of the target, renamed into place, source removed.
    CopiedAcrossVolumes,
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers never observe a partial file.
/// A `<file>.lock` sidecar serializes concurrent writers to the same path.
///
/// # Arguments
///
/// * `path` - Target file. Missing parent directories are created.
/// * `content` - Full new content of the file.
/// * `config` - Lock retry and fsync behavior.
///
/// # Errors
///
/// Returns [`Error::LockFailed`] when the sidecar lock is not acquired within
/// the retry budget, or an I/O error from writing, syncing or renaming.
pub fn write_atomic(path: &Path, content: &[u8], config: RobustnessConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let lock_path = lock_path_for(path);
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;
    lock_with_timeout(&lock_file, path, config.lock_timeout)?;

    let temp_path = sibling_temp_path(path, "tmp");
    let written = (|| {
        let mut temp_file = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
        temp_file
            .write_all(content)
            .map_err(|e| Error::io(&temp_path, e))?;
        if config.enable_fsync {
            temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
        }
        fs::rename(&temp_path, path).map_err(|e| Error::moving(&temp_path, path, e))
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    // Lock released when lock_file is dropped
    written
}

/// Append bytes to a file under an exclusive advisory lock.
///
/// Each call is one `write_all` while the lock is held, so rows written by
/// different processes never interleave.
///
/// # Errors
///
/// Returns [`Error::LockFailed`] when the lock is not acquired within the
/// retry budget, or an I/O error from opening or writing the file.
pub fn append_locked(path: &Path, content: &[u8], config: RobustnessConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    lock_with_timeout(&file, path, config.lock_timeout)?;

    file.write_all(content).map_err(|e| Error::io(path, e))?;
    if config.enable_fsync {
        file.sync_data().map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// Move `from` to `to`, replacing any existing file at `to`.
///
/// The step that makes `to` visible is always a same-volume rename. When the
/// two paths live on different volumes the source is first copied next to
/// the target under a hidden name, then renamed, then the source is removed.
///
/// # Errors
///
/// Returns [`Error::Move`] when neither the rename nor the copy fallback can
/// place the file at `to`. The hidden copy is removed on failure. After a
/// cross-volume copy, failing to remove the source is an I/O error.
pub fn move_atomic(from: &Path, to: &Path, config: RobustnessConfig) -> Result<MoveKind> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(MoveKind::Renamed),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "Cross-volume move, copying");
            copy_then_rename(from, to, config)?;
            fs::remove_file(from).map_err(|e| Error::io(from, e))?;
            Ok(MoveKind::CopiedAcrossVolumes)
        }
        Err(e) => Err(Error::moving(from, to, e)),
    }
}

fn copy_then_rename(from: &Path, to: &Path, config: RobustnessConfig) -> Result<()> {
    let temp_path = sibling_temp_path(to, "part");
    let copied = (|| {
        fs::copy(from, &temp_path).map_err(|e| Error::moving(from, &temp_path, e))?;
        if config.enable_fsync {
            File::open(&temp_path)
                .and_then(|f| f.sync_all())
                .map_err(|e| Error::io(&temp_path, e))?;
        }
        fs::rename(&temp_path, to).map_err(|e| Error::moving(&temp_path, to, e))
    })();

    if copied.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    copied
}

/// Create a directory and all of its parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

/// Size of a regular file, or `None` when nothing exists at `path`.
pub fn file_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(Error::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn lock_with_timeout(file: &File, path: &Path, timeout: Duration) -> Result<()> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_interval(Duration::from_millis(250))
        .with_max_elapsed_time(Some(timeout))
        .build();

    backoff::retry(policy, || {
        file.try_lock_exclusive().map_err(backoff::Error::transient)
    })
    .map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Hidden, collision-free sibling of `path` (same directory, same volume).
fn sibling_temp_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.{}", name, Uuid::new_v4().simple(), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_temp_path_stays_in_directory() {
        let target = Path::new("/data/out/report.csv");
        let temp = sibling_temp_path(target, "tmp");
        assert_eq!(temp.parent(), target.parent());
        let name = temp.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(".report.csv."));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn sibling_temp_paths_are_unique() {
        let target = Path::new("/data/out/report.csv");
        assert_ne!(sibling_temp_path(target, "part"), sibling_temp_path(target, "part"));
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/logs/audit.csv")),
            PathBuf::from("/logs/audit.csv.lock")
        );
    }
}
