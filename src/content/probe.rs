//! Remote image reachability.
//!
//! Probes are advisory: an unreachable host yields a warning, never a fatal
//! finding. Each URL is probed at most once per validation run.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

const MAX_CACHED_URLS: u64 = 10_000;

#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn exists(&self, url: &str) -> bool;
}

/// HEAD request with a short timeout; retries as GET when HEAD is refused.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteProbe for HttpProbe {
    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED => self
                .client
                .get(url)
                .send()
                .await
                .is_ok_and(|r| r.status().is_success()),
            Ok(resp) => {
                tracing::warn!(url, status = %resp.status(), "remote image probe failed");
                false
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "remote image unreachable");
                false
            }
        }
    }
}

/// Per-run cache in front of a probe.
#[derive(Clone)]
pub struct ProbeCache {
    probe: Arc<dyn RemoteProbe>,
    seen: Cache<String, bool>,
}

impl ProbeCache {
    pub fn new(probe: Arc<dyn RemoteProbe>) -> Self {
        Self { probe, seen: Cache::new(MAX_CACHED_URLS) }
    }

    pub async fn check(&self, url: &str) -> bool {
        let probe = Arc::clone(&self.probe);
        let owned = url.to_string();
        self.seen
            .get_with(url.to_string(), async move { probe.exists(&owned).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProbe {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RemoteProbe for CountingProbe {
        async fn exists(&self, url: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            url.contains("ok")
        }
    }

    #[tokio::test]
    async fn test_one_probe_per_url() {
        let probe = Arc::new(CountingProbe { calls: AtomicU32::new(0) });
        let cache = ProbeCache::new(probe.clone());

        assert!(cache.check("https://ok.example/a.png").await);
        assert!(cache.check("https://ok.example/a.png").await);
        assert!(!cache.check("https://down.example/b.png").await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }
}
