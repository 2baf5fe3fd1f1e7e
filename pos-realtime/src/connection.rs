//! Per-connection bookkeeping: a process-unique connection id, and a
//! registry mapping user ids to their currently-open connection ids so a
//! disconnect can remove exactly the right room memberships even when the
//! same user has more than one connection open (e.g. two tabs).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tracks which connection ids are currently open per user. `unregister` is
/// idempotent: calling it twice for the same (user, connection) pair, or
/// once for a connection id that was never registered, is a no-op rather
/// than a panic — the ping/pong timeout path and the client-close path can
/// both race to clean up the same connection.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    by_user: DashMap<String, HashSet<u64>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str, connection_id: u64) {
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id);
    }

    /// Removes this connection from the user's set. Returns `true` if the
    /// user now has no open connections left.
    pub fn unregister(&self, user_id: &str, connection_id: u64) -> bool {
        let Some(mut entry) = self.by_user.get_mut(user_id) else {
            return true;
        };
        entry.remove(&connection_id);
        let now_empty = entry.is_empty();
        drop(entry);
        if now_empty {
            self.by_user.remove(user_id);
        }
        now_empty
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.by_user.get(user_id).map(|s| s.len()).unwrap_or(0)
    }
}

/// Maximum inbound frame size (bytes). Frames larger than this are a
/// protocol violation, not a rate-limit concern — the connection is closed
/// rather than the frame silently dropped.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Outbound backlog ceiling per connection. A slow consumer that can't keep
/// up with its subscribed rooms gets disconnected once this much data is
/// queued for it, rather than let memory grow unbounded.
pub const MAX_OUTBOUND_BACKLOG_BYTES: usize = 1024 * 1024;

/// Window within which the first (and only valid) auth frame must arrive.
pub const AUTH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Ping cadence; a connection that hasn't answered within roughly two
/// intervals is considered dead and torn down.
pub const PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

pub fn frame_within_limit(bytes: usize) -> bool {
    bytes <= MAX_FRAME_BYTES
}

pub fn backlog_within_limit(queued_bytes: usize) -> bool {
    queued_bytes <= MAX_OUTBOUND_BACKLOG_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        registry.register("user-1", 1);
        assert!(registry.unregister("user-1", 1));
        assert!(registry.unregister("user-1", 1)); // second call: no panic, still "now empty"
    }

    #[test]
    fn unregistering_one_of_two_connections_keeps_the_user_registered() {
        let registry = ConnectionRegistry::new();
        registry.register("user-1", 1);
        registry.register("user-1", 2);
        assert!(!registry.unregister("user-1", 1));
        assert_eq!(registry.connection_count("user-1"), 1);
    }

    #[test]
    fn unregister_of_unknown_user_is_a_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister("ghost", 42));
    }

    #[test]
    fn frame_size_limit() {
        assert!(frame_within_limit(64 * 1024));
        assert!(!frame_within_limit(64 * 1024 + 1));
    }

    #[test]
    fn backlog_limit() {
        assert!(backlog_within_limit(1024 * 1024));
        assert!(!backlog_within_limit(1024 * 1024 + 1));
    }

    #[test]
    fn connection_ids_are_unique_and_increasing() {
        let a = next_connection_id();
        let b = next_connection_id();
        assert!(b > a);
    }
}
