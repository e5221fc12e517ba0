//! SessionHandle - public API for the session task
//!
//! Fire-and-forget methods for client commands, and an async query for the
//! current phase. Cheap to clone and share across WebSocket tasks.

use tokio::sync::{mpsc, oneshot};

use super::commands::{SessionCommand, SessionPhase};

#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Ask the console for every channel's send level on `bus`
    ///
    /// The bus also becomes the one refreshed periodically.
    pub fn request_bus_levels(&self, bus: u8) {
        let _ = self.cmd_tx.send(SessionCommand::RequestBusLevels { bus });
    }

    /// Queue a send-level change (coalesced, last write wins)
    pub fn update_volume(&self, bus: u8, channel: u8, volume: f32) {
        let _ = self.cmd_tx.send(SessionCommand::UpdateVolume {
            bus,
            channel,
            volume,
        });
    }

    /// Current session phase, or None if the session has stopped
    pub async fn phase(&self) -> Option<SessionPhase> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SessionCommand::GetPhase {
                response: response_tx,
            })
            .is_err()
        {
            return None;
        }
        response_rx.await.ok()
    }

    /// Stop the session loop
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown);
    }
}
