//! State management module - the in-memory model of the console
//!
//! The session task owns the [`MixerStore`] and is the only writer. The hub
//! and HTTP handlers read cloned snapshots through a [`StateReader`].

mod store;
mod types;

pub use store::{round_level, MixerStore, StateReader};
pub use types::{BusState, ChannelLevel, ChannelState, MixerState};
