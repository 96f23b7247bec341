//! Making a staged file visible at its destination

use std::path::Path;

use blobmirror_fs::RobustnessConfig;
use blobmirror_fs::io::{self, MoveKind};

/// Replace `destination` with `staged` in one rename.
///
/// When staging lives on another volume the file is copied next to the
/// destination first, so the visible step is still a same-volume rename.
pub fn publish(
    staged: &Path,
    destination: &Path,
    robustness: RobustnessConfig,
) -> blobmirror_fs::Result<()> {
    let kind = io::move_atomic(staged, destination, robustness)?;
    if kind == MoveKind::CopiedAcrossVolumes {
        tracing::debug!(destination = %destination.display(), "Published across volumes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn publish_replaces_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("staged.csv");
        let destination = dir.path().join("base/03 - Marzo/FOO.csv");
        std::fs::write(&staged, b"new").unwrap();

        publish(&staged, &destination, RobustnessConfig::default()).unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
        assert!(!staged.exists());

        std::fs::write(&staged, b"newer").unwrap();
        publish(&staged, &destination, RobustnessConfig::default()).unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"newer");
    }
}
