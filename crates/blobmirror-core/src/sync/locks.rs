//! One async mutex per destination path

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes attempts that resolve to the same destination.
#[derive(Debug, Default)]
pub(super) struct DestinationLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl DestinationLocks {
    pub(super) async fn acquire(&self, destination: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(destination.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}
