//! Connected client bookkeeping
//!
//! The hub keeps no per-client state beyond a live connection count, which
//! the session uses to decide whether refreshes and meters are worth it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ClientRegistry {
    count: Arc<AtomicUsize>,
}

/// Decrements the client count when dropped
pub struct ClientGuard {
    count: Arc<AtomicUsize>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for as long as the guard lives
    pub fn connect(&self) -> ClientGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ClientGuard {
            count: self.count.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn has_clients(&self) -> bool {
        self.count() > 0
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_connections() {
        let registry = ClientRegistry::new();
        assert!(!registry.has_clients());

        let a = registry.connect();
        let b = registry.clone().connect();
        assert_eq!(registry.count(), 2);

        drop(a);
        assert_eq!(registry.count(), 1);
        drop(b);
        assert!(!registry.has_clients());
    }
}
