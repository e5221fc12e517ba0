//! Distribution hub - HTTP and WebSocket surface for browser clients
//!
//! Each client gets the current snapshot on connect, then receives the
//! debounced `mixerState` and `meters` broadcasts. Client commands are
//! forwarded to the session without waiting for a reply.
//! Default port: 3000

mod broadcaster;
mod clients;
mod debounce;
mod protocol;

pub use broadcaster::{BroadcastTimings, Broadcaster};
pub use clients::{ClientGuard, ClientRegistry};
pub use debounce::Debouncer;
pub use protocol::{ClientCommand, ServerEvent, VolumeUpdate};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::session::{SessionHandle, SessionPhase};
use crate::state::{MixerState, StateReader};

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Capacity of the per-client broadcast buffer
pub const BROADCAST_CAPACITY: usize = 64;

/// Shared state for hub handlers
pub struct HubState {
    /// Read-only view of the mixer state
    pub reader: StateReader,
    /// Command channel into the session
    pub session: SessionHandle,
    /// Serialized events fanned out to every client
    pub events: broadcast::Sender<String>,
    pub clients: ClientRegistry,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    phase: Option<SessionPhase>,
    clients: usize,
}

/// Build the hub router
///
/// Files under `static_dir`, when given, are served for every other path.
pub fn build_router(state: Arc<HubState>, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/state", get(get_state))
        .route("/api/health", get(health_check))
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// GET /api/state - Current mixer snapshot
async fn get_state(State(state): State<Arc<HubState>>) -> Json<MixerState> {
    Json(state.reader.snapshot())
}

/// GET /api/health - Session phase and client count
async fn health_check(State(state): State<Arc<HubState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        phase: state.session.phase().await,
        clients: state.clients.count(),
    })
}

/// GET /ws - Client WebSocket
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<HubState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: Arc<HubState>) {
    let _guard = state.clients.connect();
    let mut rx = state.events.subscribe();
    info!("Client connected ({} total)", state.clients.count());

    let snapshot = state.reader.snapshot();
    match ServerEvent::MixerState(&snapshot).to_json() {
        Ok(json) => {
            if socket.send(Message::Text(json)).await.is_err() {
                debug!("WebSocket client disconnected before initial state");
                return;
            }
        }
        Err(e) => warn!("Failed to serialize initial state: {}", e),
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json) => {
                        if socket.send(Message::Text(json)).await.is_err() {
                            debug!("WebSocket client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {} messages", n);
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => dispatch_command(&state, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("Client disconnected ({} remaining)", state.clients.count().saturating_sub(1));
}

fn dispatch_command(state: &HubState, text: &str) {
    match ClientCommand::parse(text) {
        Ok(ClientCommand::GetBusVolumes(bus)) => {
            debug!(bus, "Client requested bus volumes");
            state.session.request_bus_levels(bus);
        }
        Ok(ClientCommand::UpdateBusVolume(update)) => {
            state
                .session
                .update_volume(update.bus, update.channel, update.volume);
        }
        Err(e) => debug!("Ignoring malformed client message: {}", e),
    }
}

/// Serve the hub until `shutdown` resolves
pub async fn start_server(
    state: Arc<HubState>,
    addr: SocketAddr,
    static_dir: Option<PathBuf>,
    shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    let router = build_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
