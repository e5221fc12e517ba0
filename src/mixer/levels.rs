//! Level and meter codec
//!
//! Converts console decibel values onto a 0.0-1.0 fader scale and decodes
//! the binary `/meters/1` payload into labelled slots.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Bytes preceding the level values in a meter blob (little-endian value count)
pub const METER_HEADER_LEN: usize = 4;

/// Slot layout of the `/meters/1` payload, in wire order.
///
/// Taken from vendor documentation for the XR18 meter bank and not verified
/// against other firmware; the order must not change.
pub const METER_SLOTS: [&str; 40] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
    "auxL", "auxR",
    "fx1PreL", "fx1PreR", "fx2PreL", "fx2PreR", "fx3PreL", "fx3PreR", "fx4PreL", "fx4PreR",
    "bus1Pre", "bus2Pre", "bus3Pre", "bus4Pre", "bus5Pre", "bus6Pre",
    "fx1SendPre", "fx2SendPre", "fx3SendPre", "fx4SendPre",
    "mainPostL", "mainPostR",
    "monL", "monR",
];

/// How derived levels are presented to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelScale {
    /// Fader scale, 0.0 (-inf) to 1.0 (0 dB)
    #[default]
    Unit,
    /// Raw decibels as reported by the console
    Decibels,
}

impl LevelScale {
    pub fn from_decibels_flag(decibels: bool) -> Self {
        if decibels {
            LevelScale::Decibels
        } else {
            LevelScale::Unit
        }
    }

    /// Present a decibel reading in this scale
    pub fn present(&self, db: f64) -> f64 {
        match self {
            LevelScale::Unit => db_to_unit(db),
            LevelScale::Decibels => db,
        }
    }
}

/// Errors raised while decoding a meter blob
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeterError {
    #[error("meter blob too short: {len} bytes, expected at least {expected}")]
    Truncated { len: usize, expected: usize },
}

/// Map decibels in [-90, +10] onto the console fader law, rescaled so that
/// unity gain (0 dB) is 1.0.
///
/// Piecewise linear with breakpoints at -90, -60, -30, -10 and +10 dB.
/// Inputs at or below -90 dB give 0.0; the result is clamped to [0.0, 1.0].
pub fn db_to_unit(db: f64) -> f64 {
    if db.is_nan() {
        return 0.0;
    }
    let d = db.min(10.0);
    let f = if d <= -90.0 {
        0.0
    } else if d < -60.0 {
        (d + 90.0) / 480.0
    } else if d < -30.0 {
        (d + 70.0) / 160.0
    } else if d < -10.0 {
        (d + 50.0) / 80.0
    } else {
        (d + 30.0) / 40.0
    };
    (f / 0.75).clamp(0.0, 1.0)
}

/// One decoded meter bank: slot label -> level, in wire order
#[derive(Debug, Clone, PartialEq)]
pub struct MeterFrame {
    levels: Vec<(&'static str, f64)>,
}

impl MeterFrame {
    pub fn get(&self, slot: &str) -> Option<f64> {
        self.levels
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.levels.iter().copied()
    }
}

impl Serialize for MeterFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.levels.len()))?;
        for (name, value) in &self.levels {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Decode a `/meters/1` blob into labelled levels
///
/// Each slot is a signed 16-bit little-endian value in 1/256 dB units.
pub fn decode_meters(blob: &[u8], scale: LevelScale) -> Result<MeterFrame, MeterError> {
    let expected = METER_HEADER_LEN + METER_SLOTS.len() * 2;
    if blob.len() < expected {
        return Err(MeterError::Truncated {
            len: blob.len(),
            expected,
        });
    }

    let levels = METER_SLOTS
        .iter()
        .zip(blob[METER_HEADER_LEN..].chunks_exact(2))
        .map(|(name, pair)| {
            let raw = i16::from_le_bytes([pair[0], pair[1]]);
            let db = f64::from(raw) / 256.0;
            (*name, scale.present(db))
        })
        .collect();

    Ok(MeterFrame { levels })
}
