use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures_util::stream::{self, StreamExt};

use crate::{
    credentials::CredentialStore,
    domain::{DeviceId, PortStatus},
    errors::Error,
    upstream::StatusSource,
    Result,
};

pub type PortsByDevice = HashMap<DeviceId, Vec<PortStatus>>;

/// Result of one batch fetch. Every requested device has an entry in `ports`.
#[derive(Clone, Debug, Default)]
pub struct FetchOutcome {
    pub ports: PortsByDevice,
    /// Devices whose credential was resolved when their request was issued.
    pub resolved: HashSet<DeviceId>,
    /// Devices we actually asked upstream about.
    pub attempted: usize,
    /// Attempted devices whose request failed (transport or vendor error) and were
    /// degraded to empty.
    pub failed: usize,
}

impl FetchOutcome {
    /// True when we asked upstream about at least one device and every request failed.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

enum DeviceResult {
    Skipped,
    Fetched(Vec<PortStatus>),
    Failed,
}

pub struct StatusFetcher {
    source: Arc<dyn StatusSource>,
    credentials: Arc<CredentialStore>,
    concurrency: usize,
}

impl StatusFetcher {
    pub fn new(
        source: Arc<dyn StatusSource>,
        credentials: Arc<CredentialStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            credentials,
            concurrency: concurrency.max(1),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Fetch ports for every device. One device failing never affects the others.
    pub async fn fetch(&self, device_ids: &[DeviceId]) -> Result<FetchOutcome> {
        if device_ids.is_empty() {
            return Err(Error::NoDevices);
        }

        let results: Vec<(DeviceId, DeviceResult)> = stream::iter(device_ids.iter().cloned())
            .map(|id| async move {
                let result = self.fetch_one(&id).await;
                (id, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut out = FetchOutcome::default();
        for (id, result) in results {
            let ports = match result {
                DeviceResult::Skipped => Vec::new(),
                DeviceResult::Fetched(p) => {
                    out.attempted += 1;
                    out.resolved.insert(id.clone());
                    p
                }
                DeviceResult::Failed => {
                    out.attempted += 1;
                    out.failed += 1;
                    out.resolved.insert(id.clone());
                    Vec::new()
                }
            };
            out.ports.insert(id, ports);
        }

        tracing::debug!(
            requested = device_ids.len(),
            attempted = out.attempted,
            failed = out.failed,
            "status fetch finished"
        );
        Ok(out)
    }

    async fn fetch_one(&self, id: &DeviceId) -> DeviceResult {
        let credential = self.credentials.resolve(id).await;
        if !credential.is_resolved() {
            tracing::debug!(device_id = %id, "no credential, skipping upstream");
            return DeviceResult::Skipped;
        }

        match self.source.device_ports(&credential).await {
            Ok(ports) => DeviceResult::Fetched(ports),
            Err(Error::Upstream { code, message }) => {
                tracing::warn!(device_id = %id, code, message = %message, "vendor rejected device query");
                DeviceResult::Failed
            }
            Err(e) => {
                tracing::warn!(device_id = %id, error = %e, "device query failed");
                DeviceResult::Failed
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{port, FakeSource};
    use super::*;
    use crate::domain::Credential;

    fn store() -> Arc<CredentialStore> {
        Arc::new(CredentialStore::in_memory([
            (DeviceId::new("a"), Credential::new("suid-a")),
            (DeviceId::new("b"), Credential::new("suid-b")),
            (DeviceId::new("c"), Credential::unresolved()),
        ]))
    }

    #[tokio::test]
    async fn empty_request_is_an_error() {
        let fetcher = StatusFetcher::new(Arc::new(FakeSource::default()), store(), 2);
        assert!(matches!(fetcher.fetch(&[]).await, Err(Error::NoDevices)));
    }

    #[tokio::test]
    async fn unresolved_devices_never_hit_upstream() {
        let source = Arc::new(FakeSource::default());
        source.answer("suid-a", vec![port(0, false, 0.0, 0.0)]);
        let fetcher = StatusFetcher::new(source.clone(), store(), 2);

        let ids = [DeviceId::new("c"), DeviceId::new("a"), DeviceId::new("zzz")];
        let out = fetcher.fetch(&ids).await.unwrap();

        assert_eq!(source.calls(), vec!["suid-a".to_string()]);
        assert_eq!(out.attempted, 1);
        assert!(out.ports[&DeviceId::new("c")].is_empty());
        assert!(out.ports[&DeviceId::new("zzz")].is_empty());
        assert_eq!(out.ports[&DeviceId::new("a")].len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let source = Arc::new(FakeSource::default());
        source.fail("suid-a");
        source.answer("suid-b", vec![port(0, true, 10.0, 100.0)]);
        let fetcher = StatusFetcher::new(source, store(), 1);

        let out = fetcher
            .fetch(&[DeviceId::new("a"), DeviceId::new("b")])
            .await
            .unwrap();

        assert_eq!(out.attempted, 2);
        assert_eq!(out.failed, 1);
        assert!(!out.all_failed());
        assert!(out.ports[&DeviceId::new("a")].is_empty());
        assert_eq!(out.ports[&DeviceId::new("b")].len(), 1);
    }

    #[tokio::test]
    async fn vendor_error_counts_as_failure() {
        // No answer registered => FakeSource returns an upstream business error.
        let fetcher = StatusFetcher::new(Arc::new(FakeSource::default()), store(), 2);
        let out = fetcher
            .fetch(&[DeviceId::new("a"), DeviceId::new("b")])
            .await
            .unwrap();
        assert_eq!(out.attempted, 2);
        assert_eq!(out.failed, 2);
        assert!(out.all_failed());
        assert!(out.ports[&DeviceId::new("a")].is_empty());
    }

    #[tokio::test]
    async fn resolved_set_reflects_credentials_at_request_time() {
        let source = Arc::new(FakeSource::default());
        source.answer("suid-a", vec![]);
        source.fail("suid-b");
        let fetcher = StatusFetcher::new(source, store(), 2);

        let out = fetcher
            .fetch(&[DeviceId::new("a"), DeviceId::new("b"), DeviceId::new("c")])
            .await
            .unwrap();
        assert_eq!(
            out.resolved,
            HashSet::from([DeviceId::new("a"), DeviceId::new("b")])
        );
    }

    #[tokio::test]
    async fn every_attempt_failing_is_flagged() {
        let source = Arc::new(FakeSource::default());
        source.fail("suid-a");
        source.fail("suid-b");
        let fetcher = StatusFetcher::new(source, store(), 4);

        let out = fetcher
            .fetch(&[DeviceId::new("a"), DeviceId::new("b"), DeviceId::new("c")])
            .await
            .unwrap();
        assert!(out.all_failed());
    }
}
