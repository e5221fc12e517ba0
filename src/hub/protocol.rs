//! WebSocket wire format
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::mixer::MeterFrame;
use crate::state::MixerState;

/// Server -> client events
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent<'a> {
    /// Full snapshot, sent on connect and after changes
    MixerState(&'a MixerState),
    /// Latest meter bank
    Meters(&'a MeterFrame),
}

impl ServerEvent<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Payload of `updateBusVolume`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VolumeUpdate {
    pub bus: u8,
    pub channel: u8,
    pub volume: f32,
}

/// Client -> server commands
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Request all send levels for one bus
    GetBusVolumes(u8),
    /// Change one channel's send level on a bus
    UpdateBusVolume(VolumeUpdate),
}

impl ClientCommand {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
