//! Console protocol: models, address decoding, level codec, request builders

pub mod address;
pub mod levels;
pub mod model;
pub mod requests;

pub use address::{decode, DecodeError, MixerEvent};
pub use levels::{db_to_unit, decode_meters, LevelScale, MeterError, MeterFrame, METER_SLOTS};
pub use model::{normalize_color, DeviceModel, ModelSpec};
