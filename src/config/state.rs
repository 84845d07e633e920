// Application state module
// Read-only configuration shared by every connection, plus connection bookkeeping

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,

    /// Connections currently being served
    pub active_connections: AtomicUsize,

    /// Woken each time a connection finishes, used while draining on shutdown
    pub connection_closed: Arc<Notify>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            active_connections: AtomicUsize::new(0),
            connection_closed: Arc::new(Notify::new()),
        }
    }

    /// Reserve a connection slot. Returns the previous count on success,
    /// or `None` when `max_connections` would be exceeded.
    pub fn try_acquire_connection(&self) -> Option<usize> {
        // Increment first, then check the limit, so concurrent accepts cannot overshoot
        let prev = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if let Some(max_conn) = self.config.performance.max_connections {
            if prev >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
                self.active_connections.fetch_sub(1, Ordering::SeqCst);
                return None;
            }
        }
        Some(prev)
    }

    pub fn release_connection(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
        self.connection_closed.notify_waiters();
    }

    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}
