// Path: crates/scheduler/src/cache.rs
//! Bounded key caches with a per-entry lifetime.

use fleet_api::clock::Clock;
use fleet_types::TimestampMs;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Remembers keys until their lifetime passes or the cache overflows.
pub struct TtlCache {
    entries: LruCache<String, TimestampMs>,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    /// A cache holding at most `capacity` keys.
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            clock,
        }
    }

    /// Remembers `key` for `ttl`.
    pub fn insert(&mut self, key: &str, ttl: Duration) {
        let until = self
            .clock
            .now_ms()
            .saturating_add(ttl.as_millis() as u64);
        self.entries.put(key.to_string(), until);
    }

    /// True if `key` is remembered and not expired.
    pub fn contains(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(until) if *until >= now => true,
            Some(_) => {
                self.entries.pop(key);
                false
            }
            None => false,
        }
    }

    /// Forgets `key`.
    pub fn remove(&mut self, key: &str) {
        self.entries.pop(key);
    }

    /// Number of remembered keys, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_test_utils::clock::ManualClock;

    #[test]
    fn entries_expire_and_overflow() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = TtlCache::new(2, clock.clone());
        cache.insert("a", Duration::from_secs(10));
        assert!(cache.contains("a"));

        clock.advance_secs(11);
        assert!(!cache.contains("a"));
        assert!(cache.is_empty());

        cache.insert("a", Duration::from_secs(10));
        cache.insert("b", Duration::from_secs(10));
        cache.insert("c", Duration::from_secs(10));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
    }
}
