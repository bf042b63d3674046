//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (PendingHandshake → Active → Closing → Closed)
//! - Generate unique connection IDs for tracing and hub membership
//! - Count live connections for shutdown draining

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a subscriber connection.
///
/// Ids increase monotonically in allocation order. Allocation happens
/// before the upgrade, so concurrent connections may join out of id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a subscriber connection. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Upgrade in progress, not yet a hub member.
    PendingHandshake,
    /// Joined the hub, both pumps running.
    Active,
    /// One pump has stopped; leaving the hub and sending a close frame.
    Closing,
    /// Both pumps exited, transport released.
    Closed,
}

impl ConnectionState {
    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns false (and stays put) for backwards or repeated moves.
    pub fn advance(&mut self, next: ConnectionState, id: ConnectionId) -> bool {
        if next <= *self {
            return false;
        }
        tracing::debug!(connection_id = %id, from = ?*self, to = ?next, "Connection state changed");
        *self = next;
        true
    }
}

/// Tracks live subscriber connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active_count: AtomicU64,
    drained: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.inner.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection is gone or `timeout` elapses.
    ///
    /// Returns the number of connections still open.
    pub async fn wait_for_drain(&self, timeout: Duration) -> u64 {
        let drained = async {
            loop {
                let notified = self.inner.drained.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(timeout, drained).await;
        self.active_count()
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.inner.active_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
