//! In-process caches fronting the durable store
//!
//! - [`TimedCache`]: concurrent key/value records with a per-entry expiry,
//!   used for silence records and theft cooldowns
//! - [`BalanceCache`]: bounded LRU of account balances

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::ledger::AccountId;

#[derive(Debug, Clone)]
struct TimedEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// String records that disappear once their TTL elapses.
///
/// Expiry is judged against the injected clock on every read; an expired
/// entry is dropped by the read that finds it.
pub struct TimedCache {
    entries: DashMap<String, TimedEntry>,
    clock: Arc<dyn Clock>,
}

impl TimedCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Drop outside the read guard to avoid deadlocking the shard
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .insert(key.to_string(), TimedEntry { value, expires_at });
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Balance lookaside cache.
///
/// A poisoned lock is reported as `None` so callers fall back to the
/// authoritative read.
pub struct BalanceCache {
    inner: Mutex<LruCache<AccountId, i64>>,
}

impl BalanceCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, id: AccountId) -> Option<i64> {
        self.inner.lock().ok()?.get(&id).copied()
    }

    pub fn put(&self, id: AccountId, balance: i64) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(id, balance);
        }
    }

    pub fn invalidate(&self, id: AccountId) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.pop(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn timed_entry_expires_with_clock() {
        let clock = Arc::new(ManualClock::default());
        let cache = TimedCache::new(clock.clone());
        cache.set("mute:5", "x".to_string(), Duration::seconds(90));

        assert_eq!(cache.get("mute:5").as_deref(), Some("x"));
        clock.advance(Duration::seconds(89));
        assert_eq!(cache.get("mute:5").as_deref(), Some("x"));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("mute:5"), None);
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn removed_entry_is_gone() {
        let cache = TimedCache::new(Arc::new(ManualClock::default()));
        cache.set("steal:7", "until".to_string(), Duration::hours(3));
        cache.remove("steal:7");
        assert_eq!(cache.get("steal:7"), None);
    }

    #[test]
    fn balance_cache_evicts_least_recent() {
        let cache = BalanceCache::new(2);
        cache.put(AccountId(1), 10);
        cache.put(AccountId(2), 20);
        cache.get(AccountId(1));
        cache.put(AccountId(3), 30);

        assert_eq!(cache.get(AccountId(2)), None);
        assert_eq!(cache.get(AccountId(1)), Some(10));
        cache.invalidate(AccountId(1));
        assert_eq!(cache.get(AccountId(1)), None);
    }
}
