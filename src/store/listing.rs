//! Lazily rebuilt listing of public files.
//!
//! Mutators of the entry map bump a membership version while they hold the
//! map's write lock. The cache remembers the version it was built from and
//! rebuilds when the two differ. Lock order on the rebuild path is always
//! cache before map; mutators never touch the cache lock.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use super::directory::EntryMap;

#[derive(Debug, Default)]
struct CachedListing {
    version: u64,
    names: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ListingCache {
    membership: AtomicU64,
    cached: RwLock<CachedListing>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change in public membership.
    ///
    /// Must be called with the entry map's write lock held.
    pub fn invalidate(&self) {
        self.membership.fetch_add(1, Ordering::AcqRel);
    }

    fn is_current(&self, cached: &CachedListing) -> bool {
        cached.version == self.membership.load(Ordering::Acquire)
    }

    /// Sorted names of public entries, rebuilding from `entries` if stale.
    ///
    /// Concurrent callers that find the cache stale queue on its write lock;
    /// the first one rebuilds and the rest reuse its result.
    pub async fn names(&self, entries: &RwLock<EntryMap>) -> Vec<String> {
        {
            let cached = self.cached.read().await;
            if self.is_current(&cached) {
                return cached.names.clone();
            }
        }

        let mut cached = self.cached.write().await;
        if !self.is_current(&cached) {
            let entries = entries.read().await;
            // Stable while the read lock is held.
            let version = self.membership.load(Ordering::Acquire);

            let mut names: Vec<String> = entries
                .iter()
                .filter(|(_, record)| record.public)
                .map(|(name, _)| name.clone())
                .collect();
            names.sort();

            debug!(
                "Rebuilt public listing: {} file(s) at version {}",
                names.len(),
                version
            );
            cached.names = names;
            cached.version = version;
        }
        cached.names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::constraints::{ConstraintRecord, Constraints};

    fn record(public: bool) -> Arc<ConstraintRecord> {
        Arc::new(ConstraintRecord::new(
            &Constraints::new().with_public(public),
            None,
        ))
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let cache = ListingCache::new();
        let entries = RwLock::new(EntryMap::new());
        assert!(cache.names(&entries).await.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_filters_and_sorts() {
        let cache = ListingCache::new();
        let entries = RwLock::new(EntryMap::new());
        {
            let mut map = entries.write().await;
            map.insert("zeta".to_string(), record(true));
            map.insert("hidden".to_string(), record(false));
            map.insert("alpha".to_string(), record(true));
            cache.invalidate();
        }

        assert_eq!(cache.names(&entries).await, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_stays_cached_until_invalidated() {
        let cache = ListingCache::new();
        let entries = RwLock::new(EntryMap::new());
        {
            let mut map = entries.write().await;
            map.insert("a".to_string(), record(true));
            cache.invalidate();
        }
        assert_eq!(cache.names(&entries).await, vec!["a"]);

        // Not invalidated, so the cached listing is still served.
        entries.write().await.insert("b".to_string(), record(true));
        assert_eq!(cache.names(&entries).await, vec!["a"]);

        {
            let _map = entries.write().await;
            cache.invalidate();
        }
        assert_eq!(cache.names(&entries).await, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_agree() {
        let cache = Arc::new(ListingCache::new());
        let entries = Arc::new(RwLock::new(EntryMap::new()));
        {
            let mut map = entries.write().await;
            for i in 0..50 {
                map.insert(format!("file{i:02}"), record(i % 2 == 0));
            }
            cache.invalidate();
        }

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let entries = Arc::clone(&entries);
            handles.push(tokio::spawn(async move { cache.names(&entries).await }));
        }

        for handle in handles {
            let names = handle.await.unwrap();
            assert_eq!(names.len(), 25);
            assert!(names.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
