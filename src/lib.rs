//! Mixer GW - OSC/UDP to WebSocket gateway for Behringer X-Air and X32 consoles
//!
//! One [`session::MixerSession`] talks to the console and owns the
//! [`state::MixerStore`]; the [`hub`] serves browser clients over WebSocket.

pub mod config;
pub mod hub;
pub mod mixer;
pub mod session;
pub mod state;
