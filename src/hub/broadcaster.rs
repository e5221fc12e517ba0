//! Broadcaster - debounced fan-out of session notifications
//!
//! State changes are coalesced (250 ms quiet period, 1 s max wait) and sent
//! as a full snapshot read at flush time. Meter banks keep only the latest
//! frame and flush on a much shorter window.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::debounce::Debouncer;
use super::protocol::ServerEvent;
use crate::mixer::MeterFrame;
use crate::session::Notification;
use crate::state::StateReader;

/// Debounce settings for client broadcasts
#[derive(Debug, Clone)]
pub struct BroadcastTimings {
    pub state_wait: Duration,
    pub state_max_wait: Duration,
    pub meter_wait: Duration,
    /// Meter banks arrive faster than `meter_wait`, so a plain debounce would never flush
    pub meter_max_wait: Duration,
}

impl Default for BroadcastTimings {
    fn default() -> Self {
        Self {
            state_wait: Duration::from_millis(250),
            state_max_wait: Duration::from_millis(1000),
            meter_wait: Duration::from_millis(50),
            meter_max_wait: Duration::from_millis(100),
        }
    }
}

pub struct Broadcaster {
    notify_rx: mpsc::UnboundedReceiver<Notification>,
    reader: StateReader,
    events_tx: broadcast::Sender<String>,
    state_debounce: Debouncer,
    meter_debounce: Debouncer,
    pending_meters: Option<MeterFrame>,
}

impl Broadcaster {
    pub fn new(
        notify_rx: mpsc::UnboundedReceiver<Notification>,
        reader: StateReader,
        events_tx: broadcast::Sender<String>,
        timings: BroadcastTimings,
    ) -> Self {
        Self {
            notify_rx,
            reader,
            events_tx,
            state_debounce: Debouncer::with_max_wait(timings.state_wait, timings.state_max_wait),
            meter_debounce: Debouncer::with_max_wait(timings.meter_wait, timings.meter_max_wait),
            pending_meters: None,
        }
    }

    /// Run until the session drops its notification sender
    pub async fn run(mut self) {
        debug!("Broadcaster started");

        loop {
            let deadline = match (self.state_debounce.deadline(), self.meter_debounce.deadline()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                notification = self.notify_rx.recv() => {
                    let now = Instant::now();
                    match notification {
                        Some(Notification::StateChanged) => self.state_debounce.trigger(now),
                        Some(Notification::Meters(frame)) => {
                            self.pending_meters = Some(frame);
                            self.meter_debounce.trigger(now);
                        }
                        None => break,
                    }
                }

                _ = sleep_until(wake_at), if deadline.is_some() => {
                    self.flush_due(Instant::now());
                }
            }
        }

        debug!("Broadcaster stopped");
    }

    fn flush_due(&mut self, now: Instant) {
        if self.state_debounce.fire(now) {
            debug!("Mixer state updated");
            let snapshot = self.reader.snapshot();
            self.publish(ServerEvent::MixerState(&snapshot));
        }
        if self.meter_debounce.fire(now) {
            if let Some(frame) = self.pending_meters.take() {
                self.publish(ServerEvent::Meters(&frame));
            }
        }
    }

    fn publish(&self, event: ServerEvent<'_>) {
        match event.to_json() {
            // No receivers just means no clients are connected
            Ok(json) => {
                let _ = self.events_tx.send(json);
            }
            Err(e) => warn!("Failed to serialize broadcast: {}", e),
        }
    }
}
