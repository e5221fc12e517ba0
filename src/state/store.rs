//! MixerStore - the single writer of [`MixerState`]
//!
//! Decoded events are applied as targeted field updates. Writes referencing
//! channels or buses outside the identified model's range, or arriving
//! before identification, are dropped without error.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{BusState, MixerState};
use crate::mixer::{normalize_color, DeviceModel, MixerEvent};

/// Round a level to two decimals so float jitter does not trigger broadcasts
pub fn round_level(level: f64) -> f64 {
    (level * 100.0).round() / 100.0
}

/// Owner of the authoritative mixer state
///
/// Only the session task holds a `MixerStore`; everyone else reads through a
/// [`StateReader`].
pub struct MixerStore {
    state: Arc<RwLock<MixerState>>,
}

/// Read-only view of the store, cheap to clone
#[derive(Clone)]
pub struct StateReader {
    state: Arc<RwLock<MixerState>>,
}

impl StateReader {
    /// Copy of the current state
    pub fn snapshot(&self) -> MixerState {
        self.state.read().clone()
    }

    pub fn model(&self) -> Option<DeviceModel> {
        self.state.read().model
    }
}

impl MixerStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MixerState::default())),
        }
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            state: self.state.clone(),
        }
    }

    pub fn model(&self) -> Option<DeviceModel> {
        self.state.read().model
    }

    pub fn snapshot(&self) -> MixerState {
        self.state.read().clone()
    }

    /// Apply a decoded event, returning whether visible state changed
    pub fn apply(&mut self, event: &MixerEvent) -> bool {
        let mut state = self.state.write();

        if let MixerEvent::DeviceIdentified(model) = event {
            return Self::identify(&mut state, *model);
        }

        let Some(model) = state.model else {
            debug!(?event, "Dropping event received before identification");
            return false;
        };

        let in_range = match event {
            MixerEvent::ChannelNameSet { channel, .. }
            | MixerEvent::ChannelColorSet { channel, .. }
            | MixerEvent::ChannelConfigSet { channel, .. }
            | MixerEvent::ChannelOnSet { channel, .. } => model.has_channel(*channel),
            MixerEvent::BusNameSet { bus, .. }
            | MixerEvent::BusColorSet { bus, .. }
            | MixerEvent::BusConfigSet { bus, .. } => model.has_bus(*bus),
            MixerEvent::ChannelBusLevelSet { channel, bus, .. } => {
                model.has_channel(*channel) && model.has_bus(*bus)
            }
            MixerEvent::MeterFrame(_) | MixerEvent::DeviceIdentified(_) => return false,
        };
        if !in_range {
            debug!(?event, %model, "Dropping out-of-range event");
            return false;
        }

        match event {
            MixerEvent::ChannelNameSet { channel, name } => {
                state.set_channel_name(*channel, name.clone())
            }
            MixerEvent::ChannelColorSet { channel, color } => {
                state.set_channel_color(*channel, normalize_color(*color, model))
            }
            MixerEvent::ChannelConfigSet {
                channel,
                name,
                color,
            } => {
                let named = state.set_channel_name(*channel, name.clone());
                let colored = state.set_channel_color(*channel, normalize_color(*color, model));
                named || colored
            }
            MixerEvent::ChannelOnSet { channel, on } => state.set_channel_on(*channel, *on),
            MixerEvent::BusNameSet { bus, name } => state.set_bus_name(*bus, name.clone()),
            MixerEvent::BusColorSet { bus, color } => {
                state.set_bus_color(*bus, normalize_color(*color, model))
            }
            MixerEvent::BusConfigSet { bus, name, color } => {
                let named = state.set_bus_name(*bus, name.clone());
                let colored = state.set_bus_color(*bus, normalize_color(*color, model));
                named || colored
            }
            MixerEvent::ChannelBusLevelSet {
                channel,
                bus,
                level,
            } => state.set_bus_level(*bus, *channel, round_level(*level)),
            MixerEvent::MeterFrame(_) | MixerEvent::DeviceIdentified(_) => false,
        }
    }

    fn identify(state: &mut MixerState, model: DeviceModel) -> bool {
        match state.model {
            Some(current) if current == model => false,
            Some(current) => {
                warn!(%current, reported = %model, "Ignoring model change from console");
                false
            }
            None => {
                info!(%model, channels = model.channel_count(), buses = model.bus_count(), "Console identified");
                state.model = Some(model);
                for bus in 1..=model.bus_count() {
                    state.buses.entry(bus).or_insert_with(BusState::default);
                }
                true
            }
        }
    }
}

impl Default for MixerStore {
    fn default() -> Self {
        Self::new()
    }
}
