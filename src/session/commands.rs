//! Messages exchanged with the session task

use serde::Serialize;
use tokio::sync::oneshot;

use crate::mixer::MeterFrame;

/// Connection lifecycle of the console session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Socket not yet opened
    Disconnected,
    /// `/info` sent, waiting for the console to identify itself
    AwaitingInfo,
    /// Model known, initial request burst in flight
    Identified,
    /// Initial sync done, periodic refresh running
    Steady,
}

/// Commands accepted by the session task
#[derive(Debug)]
pub enum SessionCommand {
    /// Re-read every channel's send level on one bus
    RequestBusLevels { bus: u8 },
    /// Coalesced send-level change
    UpdateVolume { bus: u8, channel: u8, volume: f32 },
    /// Query the current phase
    GetPhase {
        response: oneshot::Sender<SessionPhase>,
    },
    /// Stop the session loop
    Shutdown,
}

/// Notifications published by the session for the hub
#[derive(Debug, Clone)]
pub enum Notification {
    /// Visible state changed; read a fresh snapshot
    StateChanged,
    /// A meter bank arrived
    Meters(MeterFrame),
}

/// Request bursts run outside the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBatch {
    /// Full initial sync after identification
    Handshake,
    /// Channel names, colors and mute states
    ChannelRefresh,
    /// Bus names and colors
    BusNames,
}
