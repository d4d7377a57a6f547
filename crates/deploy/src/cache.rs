//! Time-boxed in-memory cache with an injectable clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

/// Default lifetime of a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// String-keyed cache whose entries expire after a fixed TTL.
///
/// Expired entries are treated as misses and dropped on access.
#[derive(Debug)]
pub struct TtlCache<V, C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V, SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<V: Clone, C: Clock> TtlCache<V, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some((inserted, value)) if now.duration_since(*inserted) < self.ttl => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), (now, value));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Return the cached value or compute, store and return a fresh one.
    ///
    /// Failures are not cached.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key) {
            tracing::trace!(key, "Cache hit");
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (Arc<ManualClock>, TtlCache<u32, Arc<ManualClock>>) {
        let clock = Arc::new(ManualClock::default());
        (clock.clone(), TtlCache::with_clock(DEFAULT_TTL, clock))
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (clock, cache) = cache();
        cache.insert("eth-price", 3000);

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("eth-price"), Some(3000));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("eth-price"), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_, cache) = cache();
        cache.insert("a", 1);
        cache.insert("b", 2);

        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert_eq!(cache.get("b"), None);
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with_fetches_once() {
        let (clock, cache) = cache();
        let mut fetches = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with("k", || {
                    fetches += 1;
                    async { Ok(7) }
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(fetches, 1);

        clock.advance(DEFAULT_TTL);
        cache
            .get_or_try_insert_with("k", || {
                fetches += 1;
                async { Ok(8) }
            })
            .await
            .unwrap();
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (_, cache) = cache();
        let result = cache
            .get_or_try_insert_with("k", || async { anyhow::bail!("upstream down") })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("k"), None);
    }
}
