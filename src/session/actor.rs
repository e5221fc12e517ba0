//! MixerSession - the console-facing task
//!
//! Owns the [`MixerStore`] and drives the connection state machine:
//!
//! ```text
//! Disconnected ──/info──▶ AwaitingInfo ──model──▶ Identified ──burst done──▶ Steady
//!                              │
//!                              └── no reply within timeout ──▶ SessionError::DeviceNotFound
//! ```
//!
//! Requests are fire-and-forget; replies are matched by address whenever they
//! arrive. Missing replies simply leave fields unset until the next refresh.

use rosc::OscMessage;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::commands::{Notification, RequestBatch, SessionCommand, SessionPhase};
use super::handle::SessionHandle;
use super::transport::OscSink;
use super::volume::{PendingVolume, VolumeChange};
use crate::hub::ClientRegistry;
use crate::mixer::{decode, decode_meters, requests, DeviceModel, LevelScale, MixerEvent};
use crate::state::{MixerStore, StateReader};

/// Timer configuration for the session
#[derive(Debug, Clone)]
pub struct SessionTimings {
    /// How long to wait for the `/info` reply
    pub identify_timeout: Duration,
    /// Pause between per-channel / per-bus request groups
    pub request_pause: Duration,
    /// Level, channel and meter refresh period while clients are connected
    pub refresh_interval: Duration,
    /// Bus name refresh period
    pub bus_name_interval: Duration,
    /// Coalescing window for outbound volume changes
    pub volume_window: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            identify_timeout: Duration::from_secs(20),
            request_pause: Duration::from_millis(100),
            refresh_interval: Duration::from_secs(10),
            bus_name_interval: Duration::from_secs(125),
            volume_window: Duration::from_millis(250),
        }
    }
}

/// Fatal session failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("mixer not found at {peer} (no identification within {timeout:?})")]
    DeviceNotFound { peer: String, timeout: Duration },
}

/// Deadline used for disabled timer branches
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

pub struct MixerSession {
    sink: Arc<dyn OscSink>,
    inbound_rx: mpsc::Receiver<OscMessage>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    batch_tx: mpsc::UnboundedSender<RequestBatch>,
    batch_rx: mpsc::UnboundedReceiver<RequestBatch>,
    store: MixerStore,
    clients: ClientRegistry,
    scale: LevelScale,
    timings: SessionTimings,
    phase: SessionPhase,
    pending_volume: PendingVolume,
    /// Bus most recently requested by a client
    viewed_bus: Option<u8>,
    /// Request burst currently running, if any
    running_batch: Option<RequestBatch>,
    /// Bursts that came due while another was running
    queued_batches: VecDeque<RequestBatch>,
}

impl MixerSession {
    /// Create the session and the handle used to command it
    pub fn new(
        sink: Arc<dyn OscSink>,
        inbound_rx: mpsc::Receiver<OscMessage>,
        notify_tx: mpsc::UnboundedSender<Notification>,
        clients: ClientRegistry,
        scale: LevelScale,
        timings: SessionTimings,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let session = Self {
            sink,
            inbound_rx,
            command_rx,
            notify_tx,
            batch_tx,
            batch_rx,
            store: MixerStore::new(),
            clients,
            scale,
            pending_volume: PendingVolume::new(timings.volume_window),
            timings,
            phase: SessionPhase::Disconnected,
            viewed_bus: None,
            running_batch: None,
            queued_batches: VecDeque::new(),
        };

        (session, SessionHandle::new(cmd_tx))
    }

    /// Read-only view of the state owned by this session
    pub fn reader(&self) -> StateReader {
        self.store.reader()
    }

    /// Run until shutdown or a fatal error
    pub async fn run(mut self) -> Result<(), SessionError> {
        info!(peer = %self.sink.peer(), "Requesting mixer info");
        self.send(requests::info()).await;
        self.phase = SessionPhase::AwaitingInfo;

        let start = Instant::now();
        let identify_deadline = start + self.timings.identify_timeout;

        let mut refresh = interval_at(
            start + self.timings.refresh_interval,
            self.timings.refresh_interval,
        );
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut bus_names = interval_at(
            start + self.timings.bus_name_interval,
            self.timings.bus_name_interval,
        );
        bus_names.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let volume_deadline = self.pending_volume.deadline();

            tokio::select! {
                Some(msg) = self.inbound_rx.recv() => {
                    self.handle_message(msg);
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Mixer session shutting down");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                Some(batch) = self.batch_rx.recv() => {
                    self.on_batch_done(batch);
                }

                _ = sleep_until(identify_deadline), if self.phase == SessionPhase::AwaitingInfo => {
                    let peer = self.sink.peer();
                    error!("Mixer not found at {}", peer);
                    return Err(SessionError::DeviceNotFound {
                        peer,
                        timeout: self.timings.identify_timeout,
                    });
                }

                _ = sleep_until(volume_deadline.unwrap_or_else(far_future)), if volume_deadline.is_some() => {
                    self.flush_volume().await;
                }

                _ = refresh.tick() => {
                    self.on_refresh_tick().await;
                }

                _ = bus_names.tick() => {
                    if self.phase == SessionPhase::Steady {
                        self.spawn_batch(RequestBatch::BusNames);
                    }
                }
            }
        }

        Ok(())
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }

    async fn send(&self, msg: OscMessage) {
        send_logged(self.sink.as_ref(), msg).await;
    }

    fn handle_message(&mut self, msg: OscMessage) {
        if msg.addr != "/meters/1" {
            trace!(addr = %msg.addr, args = ?msg.args, "OSC message from mixer");
        }

        let event = match decode(&msg) {
            Ok(event) => event,
            Err(e) => {
                debug!("Ignoring mixer message: {}", e);
                return;
            }
        };

        if let MixerEvent::MeterFrame(blob) = &event {
            match decode_meters(blob, self.scale) {
                Ok(frame) => self.notify(Notification::Meters(frame)),
                Err(e) => debug!("Ignoring meter bank: {}", e),
            }
            return;
        }

        if self.store.apply(&event) {
            self.notify(Notification::StateChanged);
        }

        if let MixerEvent::DeviceIdentified(model) = event {
            if self.phase == SessionPhase::AwaitingInfo && self.store.model() == Some(model) {
                info!("Connected to {} mixer", model);
                self.phase = SessionPhase::Identified;
                self.spawn_batch(RequestBatch::Handshake);
            }
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::RequestBusLevels { bus } => {
                let Some(model) = self.store.model() else {
                    debug!(bus, "Bus levels requested before identification");
                    return;
                };
                if !model.has_bus(bus) {
                    debug!(bus, %model, "Ignoring level request for unknown bus");
                    return;
                }
                self.viewed_bus = Some(bus);
                for msg in requests::bus_levels(model, bus) {
                    self.send(msg).await;
                }
            }
            SessionCommand::UpdateVolume {
                bus,
                channel,
                volume,
            } => {
                self.queue_volume(bus, channel, volume);
            }
            SessionCommand::GetPhase { response } => {
                let _ = response.send(self.phase);
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn queue_volume(&mut self, bus: u8, channel: u8, volume: f32) {
        let Some(model) = self.store.model() else {
            debug!("Volume change before identification ignored");
            return;
        };
        if !model.has_bus(bus) || !model.has_channel(channel) || !volume.is_finite() {
            debug!(bus, channel, volume, "Ignoring invalid volume change");
            return;
        }

        let change = VolumeChange {
            bus,
            channel,
            volume: volume.clamp(0.0, 1.0),
        };
        self.pending_volume.submit(change, Instant::now());
    }

    async fn flush_volume(&mut self) {
        if let Some(change) = self.pending_volume.take() {
            info!(
                "Updating bus {:02} channel {:02} volume to {}",
                change.bus, change.channel, change.volume
            );
            self.send(requests::set_level(change.bus, change.channel, change.volume))
                .await;
        }
    }

    async fn on_refresh_tick(&mut self) {
        if !self.clients.has_clients() {
            return;
        }

        // The console drops meter subscriptions after ~10 s
        debug!("Subscribing to meters");
        self.send(requests::subscribe_meters()).await;

        if self.phase != SessionPhase::Steady {
            return;
        }
        if let (Some(model), Some(bus)) = (self.store.model(), self.viewed_bus) {
            for msg in requests::bus_levels(model, bus) {
                self.send(msg).await;
            }
        }
        self.spawn_batch(RequestBatch::ChannelRefresh);
    }

    fn on_batch_done(&mut self, batch: RequestBatch) {
        debug!(?batch, "Request batch finished");
        if self.running_batch == Some(batch) {
            self.running_batch = None;
        }
        if batch == RequestBatch::Handshake && self.phase == SessionPhase::Identified {
            info!("Initial mixer sync complete");
            self.phase = SessionPhase::Steady;
        }
        if let Some(next) = self.queued_batches.pop_front() {
            self.spawn_batch(next);
        }
    }

    fn spawn_batch(&mut self, batch: RequestBatch) {
        let Some(model) = self.store.model() else {
            return;
        };
        if let Some(running) = self.running_batch {
            if running != batch && !self.queued_batches.contains(&batch) {
                debug!(?batch, ?running, "Queueing request batch behind running one");
                self.queued_batches.push_back(batch);
            } else {
                debug!(?batch, "Skipping request batch, same one already pending");
            }
            return;
        }

        self.running_batch = Some(batch);
        let sink = self.sink.clone();
        let pause = self.timings.request_pause;
        let done_tx = self.batch_tx.clone();
        tokio::spawn(async move {
            run_batch(sink.as_ref(), model, batch, pause).await;
            let _ = done_tx.send(batch);
        });
    }
}

async fn send_logged(sink: &dyn OscSink, msg: OscMessage) {
    if let Err(e) = sink.send(msg).await {
        warn!("Failed to send to mixer: {:#}", e);
    }
}

/// Send one request burst, pausing between groups so the console keeps up
async fn run_batch(sink: &dyn OscSink, model: DeviceModel, batch: RequestBatch, pause: Duration) {
    let request_channels = matches!(batch, RequestBatch::Handshake | RequestBatch::ChannelRefresh);
    let request_levels = batch == RequestBatch::Handshake;
    let request_buses = matches!(batch, RequestBatch::Handshake | RequestBatch::BusNames);

    if request_channels {
        debug!("Requesting channel names");
        for channel in 1..=model.channel_count() {
            for msg in requests::channel_config(model, channel) {
                send_logged(sink, msg).await;
            }
            send_logged(sink, requests::channel_on(channel)).await;
            sleep(pause).await;
        }
    }

    if request_levels {
        debug!("Requesting bus levels");
        for bus in 1..=model.bus_count() {
            for msg in requests::bus_levels(model, bus) {
                send_logged(sink, msg).await;
            }
            sleep(pause).await;
        }
    }

    if request_buses {
        debug!("Requesting bus names");
        for bus in 1..=model.bus_count() {
            for msg in requests::bus_config(model, bus) {
                send_logged(sink, msg).await;
            }
            sleep(pause).await;
        }
    }
}
