use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Local};
use tokio::{sync::Mutex, time::Instant};

use crate::{domain::QueryKey, fetcher::PortsByDevice};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub at: Instant,
    pub fetched_at: DateTime<Local>,
    pub ports: PortsByDevice,
    pub report: String,
}

impl CacheEntry {
    pub fn new(ports: PortsByDevice, report: String) -> Self {
        Self {
            at: Instant::now(),
            fetched_at: Local::now(),
            ports,
            report,
        }
    }

    pub fn age(&self) -> Duration {
        self.at.elapsed()
    }
}

/// Rendered reports per query scope, valid for a fixed window.
///
/// Shared by every caller; concurrent fetches for the same key are not coalesced and
/// the last `put` wins.
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`. Expired entries are evicted and reported as a miss.
    pub async fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        match map.get(key) {
            Some(e) if now.duration_since(e.at) < self.ttl => Some(e.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: QueryKey, entry: CacheEntry) {
        self.entries.lock().await.insert(key, entry);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Scope;

    fn key(campus: &str) -> QueryKey {
        QueryKey::new(Scope::Named(campus.to_string()), Scope::All)
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_window() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache
            .put(key("南湖"), CacheEntry::new(PortsByDevice::new(), "r".into()))
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key("南湖")).await.unwrap().report, "r");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key("南湖")).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn clear_drops_every_key() {
        let cache = ResultCache::default();
        cache
            .put(key("a"), CacheEntry::new(PortsByDevice::new(), "a".into()))
            .await;
        cache
            .put(
                QueryKey::new(Scope::All, Scope::All),
                CacheEntry::new(PortsByDevice::new(), "all".into()),
            )
            .await;
        cache.clear().await;
        assert!(cache.get(&key("a")).await.is_none());
        assert!(cache.get(&QueryKey::new(Scope::All, Scope::All)).await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_wholesale() {
        let cache = ResultCache::default();
        cache
            .put(key("a"), CacheEntry::new(PortsByDevice::new(), "old".into()))
            .await;
        cache
            .put(key("a"), CacheEntry::new(PortsByDevice::new(), "new".into()))
            .await;
        assert_eq!(cache.get(&key("a")).await.unwrap().report, "new");
    }
}
