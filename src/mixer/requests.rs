//! Outbound OSC message builders
//!
//! Channel indices are always two digits. Bus indices are two digits inside
//! `/ch/NN/mix/BB/level`, but `/bus/..` config addresses follow the model's
//! padding rule.

use rosc::{OscMessage, OscType};

use super::model::DeviceModel;

fn query(addr: String) -> OscMessage {
    OscMessage { addr, args: vec![] }
}

fn pad2(index: u8) -> String {
    format!("{:02}", index)
}

fn bus_segment(model: DeviceModel, bus: u8) -> String {
    if model.spec().padded_bus_index {
        pad2(bus)
    } else {
        bus.to_string()
    }
}

/// `/info` identification request
pub fn info() -> OscMessage {
    query("/info".to_string())
}

/// Name/color requests for one channel
pub fn channel_config(model: DeviceModel, channel: u8) -> Vec<OscMessage> {
    let ch = pad2(channel);
    if model.spec().split_config_requests {
        vec![
            query(format!("/ch/{}/config/name", ch)),
            query(format!("/ch/{}/config/color", ch)),
        ]
    } else {
        vec![query(format!("/ch/{}/config", ch))]
    }
}

/// Mute state request for one channel
pub fn channel_on(channel: u8) -> OscMessage {
    query(format!("/ch/{}/mix/on", pad2(channel)))
}

/// Send level requests for every channel on one bus
pub fn bus_levels(model: DeviceModel, bus: u8) -> Vec<OscMessage> {
    (1..=model.channel_count())
        .map(|channel| query(format!("/ch/{}/mix/{}/level", pad2(channel), pad2(bus))))
        .collect()
}

/// Name/color requests for one bus
pub fn bus_config(model: DeviceModel, bus: u8) -> Vec<OscMessage> {
    let b = bus_segment(model, bus);
    if model.spec().split_config_requests {
        vec![
            query(format!("/bus/{}/config/name", b)),
            query(format!("/bus/{}/config/color", b)),
        ]
    } else {
        vec![query(format!("/bus/{}/config", b))]
    }
}

/// Set one channel's send level on a bus
pub fn set_level(bus: u8, channel: u8, volume: f32) -> OscMessage {
    OscMessage {
        addr: format!("/ch/{}/mix/{}/level", pad2(channel), pad2(bus)),
        args: vec![OscType::Float(volume)],
    }
}

/// (Re)subscribe to the `/meters/1` stream; the console drops it after ~10 s
pub fn subscribe_meters() -> OscMessage {
    OscMessage {
        addr: "/meters".to_string(),
        args: vec![OscType::String("/meters/1".to_string())],
    }
}
