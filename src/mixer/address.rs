//! Inbound OSC address decoding
//!
//! Turns a console reply (`/category/index/sub/path` plus typed arguments)
//! into a [`MixerEvent`]. Segments are inspected positionally; indices are
//! parsed but not range checked (the state store drops out-of-range writes).

use rosc::{OscMessage, OscType};
use thiserror::Error;

use super::model::DeviceModel;

/// Semantic event decoded from one console message
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    /// `/info` reply naming the console model
    DeviceIdentified(DeviceModel),
    ChannelNameSet { channel: u8, name: String },
    /// Raw (not yet normalized) color index
    ChannelColorSet { channel: u8, color: i32 },
    ChannelConfigSet { channel: u8, name: String, color: i32 },
    ChannelOnSet { channel: u8, on: bool },
    BusNameSet { bus: u8, name: String },
    BusColorSet { bus: u8, color: i32 },
    BusConfigSet { bus: u8, name: String, color: i32 },
    ChannelBusLevelSet { channel: u8, bus: u8, level: f64 },
    /// Raw `/meters/1` blob
    MeterFrame(Vec<u8>),
}

/// Reasons a console message could not be turned into an event
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unrecognized address: {0}")]
    Unrecognized(String),

    #[error("invalid index '{segment}' in {addr}")]
    BadIndex { addr: String, segment: String },

    #[error("missing or mistyped argument {index} for {addr}")]
    BadArgument { addr: String, index: usize },

    #[error("unknown console model '{0}'")]
    UnknownModel(String),
}

/// Decode one OSC message into a mixer event
pub fn decode(msg: &OscMessage) -> Result<MixerEvent, DecodeError> {
    let addr = msg.addr.as_str();
    let segments: Vec<&str> = addr.trim_start_matches('/').split('/').collect();

    match segments.as_slice() {
        ["info"] => {
            let name = string_arg(msg, 2)?;
            DeviceModel::from_name(&name)
                .map(MixerEvent::DeviceIdentified)
                .ok_or(DecodeError::UnknownModel(name))
        }

        ["ch", idx, "config", "name"] => Ok(MixerEvent::ChannelNameSet {
            channel: parse_index(addr, idx)?,
            name: string_arg(msg, 0)?,
        }),
        ["ch", idx, "config", "color"] => Ok(MixerEvent::ChannelColorSet {
            channel: parse_index(addr, idx)?,
            color: int_arg(msg, 0)?,
        }),
        // Combined reply carries name and color positionally
        ["ch", idx, "config"] => Ok(MixerEvent::ChannelConfigSet {
            channel: parse_index(addr, idx)?,
            name: string_arg(msg, 0)?,
            color: int_arg(msg, 1)?,
        }),
        ["ch", idx, "mix", "on"] => Ok(MixerEvent::ChannelOnSet {
            channel: parse_index(addr, idx)?,
            on: int_arg(msg, 0)? == 1,
        }),
        ["ch", ch, "mix", bus, "level"] => Ok(MixerEvent::ChannelBusLevelSet {
            channel: parse_index(addr, ch)?,
            bus: parse_index(addr, bus)?,
            level: float_arg(msg, 0)?,
        }),

        ["bus", idx, "config", "name"] => Ok(MixerEvent::BusNameSet {
            bus: parse_index(addr, idx)?,
            name: string_arg(msg, 0)?,
        }),
        ["bus", idx, "config", "color"] => Ok(MixerEvent::BusColorSet {
            bus: parse_index(addr, idx)?,
            color: int_arg(msg, 0)?,
        }),
        ["bus", idx, "config"] => Ok(MixerEvent::BusConfigSet {
            bus: parse_index(addr, idx)?,
            name: string_arg(msg, 0)?,
            color: int_arg(msg, 1)?,
        }),

        ["meters", "1"] => match msg.args.first() {
            Some(OscType::Blob(blob)) => Ok(MixerEvent::MeterFrame(blob.clone())),
            _ => Err(DecodeError::BadArgument {
                addr: addr.to_string(),
                index: 0,
            }),
        },

        _ => Err(DecodeError::Unrecognized(addr.to_string())),
    }
}

fn parse_index(addr: &str, segment: &str) -> Result<u8, DecodeError> {
    segment.parse::<u8>().map_err(|_| DecodeError::BadIndex {
        addr: addr.to_string(),
        segment: segment.to_string(),
    })
}

fn bad_arg(msg: &OscMessage, index: usize) -> DecodeError {
    DecodeError::BadArgument {
        addr: msg.addr.clone(),
        index,
    }
}

fn string_arg(msg: &OscMessage, index: usize) -> Result<String, DecodeError> {
    match msg.args.get(index) {
        Some(OscType::String(s)) => Ok(s.clone()),
        _ => Err(bad_arg(msg, index)),
    }
}

fn int_arg(msg: &OscMessage, index: usize) -> Result<i32, DecodeError> {
    match msg.args.get(index) {
        Some(OscType::Int(i)) => Ok(*i),
        Some(OscType::Long(l)) => i32::try_from(*l).map_err(|_| bad_arg(msg, index)),
        Some(OscType::Float(f)) => Ok(f.round() as i32),
        Some(OscType::Double(d)) => Ok(d.round() as i32),
        _ => Err(bad_arg(msg, index)),
    }
}

fn float_arg(msg: &OscMessage, index: usize) -> Result<f64, DecodeError> {
    match msg.args.get(index) {
        Some(OscType::Float(f)) => Ok(f64::from(*f)),
        Some(OscType::Double(d)) => Ok(*d),
        Some(OscType::Int(i)) => Ok(f64::from(*i)),
        _ => Err(bad_arg(msg, index)),
    }
}
