//! Timeouts and cancellation around any [`RemoteStore`]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ProbeError, RemoteObjectInfo, RemoteStore, TransferError};
use crate::catalog::RemoteLocator;

/// Races every call against a deadline and a shared cancellation token.
///
/// Losing the race drops the inner future, which for process-backed stores
/// kills the child.
#[derive(Clone)]
pub struct GuardedRemote {
    inner: Arc<dyn RemoteStore>,
    probe_timeout: Duration,
    transfer_timeout: Duration,
    cancel: CancellationToken,
}

impl GuardedRemote {
    pub fn new(
        inner: Arc<dyn RemoteStore>,
        probe_timeout: Duration,
        transfer_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            probe_timeout,
            transfer_timeout,
            cancel,
        }
    }
}

#[async_trait]
impl RemoteStore for GuardedRemote {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn probe(&self, locator: &RemoteLocator) -> Result<RemoteObjectInfo, ProbeError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            result = tokio::time::timeout(self.probe_timeout, self.inner.probe(locator)) => {
                result.unwrap_or(Err(ProbeError::TimedOut(self.probe_timeout)))
            }
        }
    }

    async fn fetch(&self, locator: &RemoteLocator, into: &Path) -> Result<(), TransferError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(self.transfer_timeout, self.inner.fetch(locator, into)) => {
                result.unwrap_or(Err(TransferError::TimedOut(self.transfer_timeout)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl RemoteStore for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn probe(&self, _: &RemoteLocator) -> Result<RemoteObjectInfo, ProbeError> {
            std::future::pending().await
        }

        async fn fetch(&self, _: &RemoteLocator, _: &Path) -> Result<(), TransferError> {
            std::future::pending().await
        }
    }

    fn locator() -> RemoteLocator {
        RemoteLocator::parse("gs://bucket/CIERRES/FOO.csv").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn probe_times_out() {
        let guard = GuardedRemote::new(
            Arc::new(Stalled),
            Duration::from_secs(60),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let result = guard.probe(&locator()).await;
        assert!(matches!(result, Err(ProbeError::TimedOut(d)) if d == Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_fetch() {
        let cancel = CancellationToken::new();
        let guard = GuardedRemote::new(
            Arc::new(Stalled),
            Duration::from_secs(60),
            Duration::from_secs(3600),
            cancel.clone(),
        );
        cancel.cancel();
        let result = guard.fetch(&locator(), Path::new("/tmp/x")).await;
        assert!(matches!(result, Err(TransferError::Cancelled)));
    }
}
