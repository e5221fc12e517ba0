//! Mixer state type definitions
//!
//! Defines the snapshot broadcast to clients. Map keys are 1-based channel
//! and bus numbers; serde_json renders them as string keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::mixer::DeviceModel;

/// Per-channel attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub name: Option<String>,
    /// Normalized palette index
    pub color: Option<i32>,
    /// Channel on (unmuted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
}

/// Send level of one channel on a bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLevel {
    pub level: f64,
}

/// Per-bus attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusState {
    pub name: Option<String>,
    pub color: Option<i32>,
    pub channels: BTreeMap<u8, ChannelLevel>,
}

/// Complete console snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    pub model: Option<DeviceModel>,
    pub channels: BTreeMap<u8, ChannelState>,
    pub buses: BTreeMap<u8, BusState>,
}

/// Replace `slot` with `value`, reporting whether it changed
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl MixerState {
    pub fn is_identified(&self) -> bool {
        self.model.is_some()
    }

    fn channel_mut(&mut self, channel: u8) -> &mut ChannelState {
        self.channels.entry(channel).or_default()
    }

    fn bus_mut(&mut self, bus: u8) -> &mut BusState {
        self.buses.entry(bus).or_default()
    }

    pub fn set_channel_name(&mut self, channel: u8, name: String) -> bool {
        replace(&mut self.channel_mut(channel).name, Some(name))
    }

    pub fn set_channel_color(&mut self, channel: u8, color: i32) -> bool {
        replace(&mut self.channel_mut(channel).color, Some(color))
    }

    pub fn set_channel_on(&mut self, channel: u8, on: bool) -> bool {
        replace(&mut self.channel_mut(channel).on, Some(on))
    }

    pub fn set_bus_name(&mut self, bus: u8, name: String) -> bool {
        replace(&mut self.bus_mut(bus).name, Some(name))
    }

    pub fn set_bus_color(&mut self, bus: u8, color: i32) -> bool {
        replace(&mut self.bus_mut(bus).color, Some(color))
    }

    pub fn set_bus_level(&mut self, bus: u8, channel: u8, level: f64) -> bool {
        let channels = &mut self.bus_mut(bus).channels;
        match channels.get_mut(&channel) {
            Some(existing) => replace(&mut existing.level, level),
            None => {
                channels.insert(channel, ChannelLevel { level });
                true
            }
        }
    }

    /// Look up a stored send level
    pub fn level(&self, bus: u8, channel: u8) -> Option<f64> {
        self.buses
            .get(&bus)
            .and_then(|b| b.channels.get(&channel))
            .map(|c| c.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_report_changes() {
        let mut state = MixerState::default();
        assert!(state.set_channel_name(1, "Kick".into()));
        assert!(!state.set_channel_name(1, "Kick".into()));
        assert!(state.set_channel_name(1, "Snare".into()));
        assert!(state.set_bus_level(2, 1, 0.5));
        assert!(!state.set_bus_level(2, 1, 0.5));
        assert_eq!(state.level(2, 1), Some(0.5));
        assert_eq!(state.level(2, 9), None);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut state = MixerState {
            model: Some(DeviceModel::XR18),
            ..Default::default()
        };
        state.set_channel_name(1, "Vox".into());
        state.set_channel_on(1, true);
        state.buses.insert(1, BusState::default());
        state.set_bus_level(1, 3, 0.75);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "XR18",
                "channels": { "1": { "name": "Vox", "color": null, "on": true } },
                "buses": {
                    "1": { "name": null, "color": null, "channels": { "3": { "level": 0.75 } } }
                }
            })
        );
    }
}
