//! Token-bucket rate limiting, keyed per caller, plus a concurrent-connection
//! counter for WebSocket connection-count limits (5 per user, 20 per IP).

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

fn refill_and_try_consume(bucket: &mut TokenBucket, capacity: f64, refill_per_sec: f64, cost: f64) -> bool {
    let now = Instant::now();
    let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
    bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(capacity);
    bucket.last_refill = now;
    if bucket.tokens >= cost {
        bucket.tokens -= cost;
        true
    } else {
        false
    }
}

/// Per-key independent token buckets sharing one capacity/refill policy.
///
/// Used for the real-time hub's 20 messages/sec-per-connection limit and
/// the identity verifier's introspection burst protection.
pub struct RateLimiter<K> {
    buckets: DashMap<K, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec,
        }
    }

    /// Attempt to consume `cost` tokens from `key`'s bucket, creating a full
    /// bucket on first use. Returns `true` if allowed.
    pub fn try_consume(&self, key: &K, cost: f64) -> bool {
        let mut entry = self.buckets.entry(key.clone()).or_insert_with(|| TokenBucket {
            tokens: self.capacity,
            last_refill: Instant::now(),
        });
        refill_and_try_consume(&mut entry, self.capacity, self.refill_per_sec, cost)
    }

    pub fn remove(&self, key: &K) {
        self.buckets.remove(key);
    }
}

/// Counts concurrently-open resources per key (e.g. WebSocket connections
/// per user, or per IP) and rejects once a ceiling is reached.
///
/// Unlike `RateLimiter`, this tracks a *count of currently-held slots*, not
/// a refilling budget — a connection closing frees its slot immediately
/// rather than on a timer.
#[derive(Clone)]
pub struct ConnectionLimiter<K> {
    counts: Arc<DashMap<K, Arc<AtomicI64>>>,
    max_per_key: i64,
}

pub struct ConnectionGuard<K: Eq + Hash> {
    key: K,
    counts: Arc<DashMap<K, Arc<AtomicI64>>>,
}

impl<K: Eq + Hash> Drop for ConnectionGuard<K> {
    fn drop(&mut self) {
        if let Some(counter) = self.counts.get(&self.key) {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl<K: Eq + Hash + Clone> ConnectionLimiter<K> {
    pub fn new(max_per_key: i64) -> Self {
        Self {
            counts: Arc::new(DashMap::new()),
            max_per_key,
        }
    }

    /// Attempts to reserve a slot for `key`. On success, returns a guard that
    /// releases the slot when dropped (i.e. when the connection closes).
    pub fn try_acquire(&self, key: K) -> Option<ConnectionGuard<K>> {
        let counter = self
            .counts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone();
        let previous = counter.fetch_add(1, Ordering::SeqCst);
        if previous >= self.max_per_key {
            counter.fetch_sub(1, Ordering::SeqCst);
            None
        } else {
            Some(ConnectionGuard {
                key,
                counts: self.counts.clone(),
            })
        }
    }

    pub fn current(&self, key: &K) -> i64 {
        self.counts
            .get(key)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_blocks() {
        let limiter = RateLimiter::new(2.0, 1.0);
        assert!(limiter.try_consume(&"conn-1", 1.0));
        assert!(limiter.try_consume(&"conn-1", 1.0));
        assert!(!limiter.try_consume(&"conn-1", 1.0));
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(1.0, 1000.0);
        assert!(limiter.try_consume(&"conn-1", 1.0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.try_consume(&"conn-1", 1.0));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.try_consume(&"a", 1.0));
        assert!(limiter.try_consume(&"b", 1.0));
        assert!(!limiter.try_consume(&"a", 1.0));
    }

    #[test]
    fn connection_limiter_enforces_ceiling() {
        let limiter = ConnectionLimiter::new(2);
        let g1 = limiter.try_acquire("user-1").unwrap();
        let g2 = limiter.try_acquire("user-1").unwrap();
        assert!(limiter.try_acquire("user-1").is_none());
        drop(g1);
        assert!(limiter.try_acquire("user-1").is_some());
        drop(g2);
    }

    #[test]
    fn connection_limiter_frees_slot_on_drop() {
        let limiter = ConnectionLimiter::new(1);
        {
            let _guard = limiter.try_acquire("ip-1").unwrap();
            assert_eq!(limiter.current(&"ip-1"), 1);
        }
        assert_eq!(limiter.current(&"ip-1"), 0);
    }
}
