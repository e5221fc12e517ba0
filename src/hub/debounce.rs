//! Debounce timer with an optional max-wait bound
//!
//! A trigger (re)starts the quiet-period deadline. With a max wait set, a
//! second deadline measured from the first unflushed trigger bounds the
//! delay under continuous triggering. Whichever deadline comes first fires.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    max_wait: Option<Duration>,
    first_trigger: Option<Instant>,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            max_wait: None,
            first_trigger: None,
            last_trigger: None,
        }
    }

    pub fn with_max_wait(wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_wait: Some(max_wait),
            ..Self::new(wait)
        }
    }

    /// Record a trigger at `now`
    pub fn trigger(&mut self, now: Instant) {
        if self.first_trigger.is_none() {
            self.first_trigger = Some(now);
        }
        self.last_trigger = Some(now);
    }

    /// Earliest instant at which the pending trigger should flush
    pub fn deadline(&self) -> Option<Instant> {
        let quiet = self.last_trigger? + self.wait;
        match (self.max_wait, self.first_trigger) {
            (Some(max_wait), Some(first)) => Some(quiet.min(first + max_wait)),
            _ => Some(quiet),
        }
    }

    /// Consume the pending trigger if its deadline has passed
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.first_trigger = None;
                self.last_trigger = None;
                true
            }
            _ => false,
        }
    }
}
