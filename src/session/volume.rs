//! Coalescing buffer for outbound send-level changes
//!
//! Holds at most one pending change. A newer request overwrites the unsent
//! one; the flush timer is armed by the first request and is not pushed back
//! by later ones.

use std::time::Duration;
use tokio::time::Instant;

/// Default coalescing window for volume changes
pub const DEFAULT_VOLUME_WINDOW_MS: u64 = 250;

/// One send-level change requested by a client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeChange {
    pub bus: u8,
    pub channel: u8,
    pub volume: f32,
}

/// Single-slot last-write-wins buffer with a flush deadline
#[derive(Debug)]
pub struct PendingVolume {
    latest: Option<VolumeChange>,
    deadline: Option<Instant>,
    window: Duration,
}

impl PendingVolume {
    pub fn new(window: Duration) -> Self {
        Self {
            latest: None,
            deadline: None,
            window,
        }
    }

    /// Store `change`, arming the timer if it is not already running
    ///
    /// Returns true when this call armed the timer.
    pub fn submit(&mut self, change: VolumeChange, now: Instant) -> bool {
        self.latest = Some(change);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
            true
        } else {
            false
        }
    }

    /// When the pending change must be sent, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the latest change and disarm the timer
    pub fn take(&mut self) -> Option<VolumeChange> {
        self.deadline = None;
        self.latest.take()
    }
}

impl Default for PendingVolume {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_VOLUME_WINDOW_MS))
    }
}
