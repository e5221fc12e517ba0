//! Session module - the single task talking to the console
//!
//! Identifies the console, runs the initial and periodic request bursts,
//! applies replies to the state store and coalesces outbound level changes.

mod actor;
mod commands;
mod handle;
mod transport;
mod volume;

#[cfg(test)]
mod tests;

pub use actor::{MixerSession, SessionError, SessionTimings};
pub use commands::{Notification, SessionCommand, SessionPhase};
pub use handle::SessionHandle;
pub use transport::{flatten_packet, resolve_remote, OscSink, UdpTransport};
pub use volume::{PendingVolume, VolumeChange, DEFAULT_VOLUME_WINDOW_MS};
