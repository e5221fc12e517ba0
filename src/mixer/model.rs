//! Supported console models and their addressing quirks
//!
//! Every model-specific behaviour (channel/bus counts, palette offset, index
//! padding, split config requests) lives in the [`ModelSpec`] table so new
//! consoles only need a new table row.

use serde::{Deserialize, Serialize};

/// Console variants the gateway knows how to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModel {
    XR12,
    XR16,
    XR18,
    X32,
}

/// Static description of a console variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Number of input channels (1-based addressing)
    pub channels: u8,
    /// Number of aux buses (1-based addressing)
    pub buses: u8,
    /// Palette offset applied to raw color indices (0 = none)
    pub color_offset: i32,
    /// Bus indices in `/bus/..` addresses are zero padded to two digits
    pub padded_bus_index: bool,
    /// Name and color must be requested separately instead of `/config`
    pub split_config_requests: bool,
}

impl DeviceModel {
    /// All known models
    pub fn all() -> &'static [DeviceModel] {
        &[
            DeviceModel::XR12,
            DeviceModel::XR16,
            DeviceModel::XR18,
            DeviceModel::X32,
        ]
    }

    /// Quirk table row for this model
    pub fn spec(&self) -> ModelSpec {
        match self {
            DeviceModel::XR12 => ModelSpec {
                channels: 8,
                buses: 2,
                color_offset: 0,
                padded_bus_index: false,
                split_config_requests: false,
            },
            DeviceModel::XR16 => ModelSpec {
                channels: 16,
                buses: 4,
                color_offset: 0,
                padded_bus_index: false,
                split_config_requests: false,
            },
            DeviceModel::XR18 => ModelSpec {
                channels: 16,
                buses: 6,
                color_offset: 0,
                padded_bus_index: false,
                split_config_requests: false,
            },
            DeviceModel::X32 => ModelSpec {
                channels: 32,
                buses: 8,
                color_offset: 8,
                padded_bus_index: true,
                split_config_requests: true,
            },
        }
    }

    pub fn channel_count(&self) -> u8 {
        self.spec().channels
    }

    pub fn bus_count(&self) -> u8 {
        self.spec().buses
    }

    /// Parse the model name reported in the `/info` reply
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "XR12" => Some(DeviceModel::XR12),
            "XR16" => Some(DeviceModel::XR16),
            "XR18" => Some(DeviceModel::XR18),
            "X32" => Some(DeviceModel::X32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceModel::XR12 => "XR12",
            DeviceModel::XR16 => "XR16",
            DeviceModel::XR18 => "XR18",
            DeviceModel::X32 => "X32",
        }
    }

    /// Whether `channel` is addressable on this model
    pub fn has_channel(&self, channel: u8) -> bool {
        (1..=self.channel_count()).contains(&channel)
    }

    /// Whether `bus` is addressable on this model
    pub fn has_bus(&self, bus: u8) -> bool {
        (1..=self.bus_count()).contains(&bus)
    }
}

impl std::fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a raw console color index onto the common palette
///
/// Models with a palette offset store the same colors shifted by 8, so the
/// two halves of the 16-entry palette are swapped.
pub fn normalize_color(raw: i32, model: DeviceModel) -> i32 {
    let offset = model.spec().color_offset;
    if offset == 0 {
        return raw;
    }
    if raw > offset - 1 {
        raw - offset
    } else {
        raw + offset
    }
}
