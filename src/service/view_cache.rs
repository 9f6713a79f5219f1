use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;

/// A keyed cache of short-lived view snapshots, backed by `moka::future::Cache`.
///
/// Entries expire after the TTL the cache was built with. Concurrent misses on one key share a single compute.
///
/// Every key also carries a generation that [ViewCache::invalidate] bumps. Snapshots are stored under
/// `(key, generation)`, so a compute that started before an invalidation never serves a later reader.
pub struct ViewCache<K, V> {
    /// `None` when the TTL is zero and nothing is ever kept.
    snapshots: Option<Cache<(K, u64), V>>,
    generations: DashMap<K, u64>,
}

impl<K, V> ViewCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        let snapshots = (!ttl.is_zero()).then(|| Cache::builder().time_to_live(ttl).build());

        Self {
            snapshots,
            generations: DashMap::new(),
        }
    }

    fn generation(&self, key: &K) -> u64 {
        self.generations.get(key).map_or(0, |generation| *generation)
    }

    /// Returns the cached value for `key`, or awaits `compute` and caches its result.
    ///
    /// Errors from `compute` are handed back to the caller and never cached.
    pub async fn get_or_compute<F, E>(&self, key: K, compute: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let Some(snapshots) = &self.snapshots else {
            return compute.await.map_err(Arc::new);
        };

        let generation = self.generation(&key);
        let value = snapshots
            .try_get_with((key.clone(), generation), compute)
            .await?;

        // invalidated while computing: nobody reads this generation anymore
        if self.generation(&key) != generation {
            snapshots.invalidate(&(key, generation)).await;
        }

        Ok(value)
    }

    /// Drops the value stored under `key` so the next read recomputes it.
    pub async fn invalidate(&self, key: &K) {
        let stale = {
            let mut generation = self.generations.entry(key.clone()).or_insert(0);
            *generation += 1;
            *generation - 1
        };

        if let Some(snapshots) = &self.snapshots {
            snapshots.invalidate(&(key.clone(), stale)).await;
        }
    }

    /// The live snapshot for `key`, if there is one.
    #[cfg(test)]
    pub async fn get(&self, key: &K) -> Option<V> {
        let snapshots = self.snapshots.as_ref()?;
        snapshots.get(&(key.clone(), self.generation(key))).await
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    /// Computes the number of times it has been called.
    #[derive(Default)]
    struct Counter(AtomicU64);

    impl Counter {
        async fn next(&self) -> Result<u64, Infallible> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn calls(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);
        let counter = Counter::default();

        let first = cache.get_or_compute("landing", counter.next()).await;
        let second = cache.get_or_compute("landing", counter.next()).await;

        assert_eq!(first.ok(), Some(1));
        assert_eq!(second.ok(), Some(1), "value is still fresh");
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn recompute_after_expiry() {
        let ttl = Duration::from_millis(50);
        let cache: ViewCache<&str, u64> = ViewCache::new(ttl);
        let counter = Counter::default();

        cache.get_or_compute("landing", counter.next()).await.unwrap();
        tokio::time::sleep(ttl * 3).await;

        assert_eq!(cache.get(&"landing").await, None);
        let value = cache.get_or_compute("landing", counter.next()).await;
        assert_eq!(value.ok(), Some(2));
    }

    #[tokio::test]
    async fn invalidate_only_affects_its_key() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);
        let counter = Counter::default();

        cache.get_or_compute("landing", counter.next()).await.unwrap();
        cache.get_or_compute("map", counter.next()).await.unwrap();

        cache.invalidate(&"landing").await;

        assert_eq!(cache.get(&"landing").await, None);
        assert_eq!(cache.get(&"map").await, Some(2));
        let value = cache.get_or_compute("landing", counter.next()).await;
        assert_eq!(value.ok(), Some(3));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);

        let failed = cache
            .get_or_compute("landing", async { Err::<u64, _>("database down") })
            .await;
        assert_eq!(failed.unwrap_err().as_ref(), &"database down");
        assert_eq!(cache.get(&"landing").await, None);

        let value = cache
            .get_or_compute("landing", async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(value.ok(), Some(7));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_compute() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);
        let counter = &Counter::default();

        let slow = move || async move {
            tokio::task::yield_now().await;
            counter.next().await
        };

        let (first, second) = tokio::join!(
            cache.get_or_compute("landing", slow()),
            cache.get_or_compute("landing", slow()),
        );

        assert_eq!(first.ok(), Some(1));
        assert_eq!(second.ok(), Some(1));
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn invalidation_during_compute_discards_stale_value() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);

        let value = cache
            .get_or_compute("landing", async {
                // a click lands while the old total is being read
                cache.invalidate(&"landing").await;
                Ok::<_, Infallible>(3)
            })
            .await;

        assert_eq!(value.ok(), Some(3), "the caller still gets what it computed");
        assert_eq!(cache.get(&"landing").await, None, "but it is not cached");
    }

    #[tokio::test]
    async fn reader_after_invalidation_skips_running_compute() {
        let cache: ViewCache<&str, u64> = ViewCache::new(TTL);
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let stale = cache.get_or_compute("landing", async {
            let _ = released.await;
            Ok::<_, Infallible>(1)
        });

        let fresh = async {
            cache.invalidate(&"landing").await;
            let value = cache
                .get_or_compute("landing", async { Ok::<_, Infallible>(2) })
                .await;
            let _ = release.send(());
            value
        };

        let (stale, fresh) = tokio::join!(stale, fresh);

        assert_eq!(stale.ok(), Some(1));
        assert_eq!(fresh.ok(), Some(2));
        assert_eq!(cache.get(&"landing").await, Some(2));
    }

    #[tokio::test]
    async fn zero_ttl_never_hits() {
        let cache: ViewCache<&str, u64> = ViewCache::new(Duration::ZERO);
        let counter = Counter::default();

        cache.get_or_compute("map", counter.next()).await.unwrap();
        let value = cache.get_or_compute("map", counter.next()).await;

        assert_eq!(value.ok(), Some(2));
        assert_eq!(cache.get(&"map").await, None);
    }
}
