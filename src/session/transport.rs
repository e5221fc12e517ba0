//! UDP transport to the console
//!
//! Outbound messages go through the [`OscSink`] trait so the session can be
//! driven by a fake sink in tests. Inbound datagrams are decoded by a reader
//! task and delivered over an mpsc channel.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rosc::{OscMessage, OscPacket};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Largest datagram the console sends (meter banks and long `/node` replies fit)
const MAX_DATAGRAM: usize = 8192;

/// Capacity of the inbound message queue
const INBOUND_QUEUE: usize = 1024;

/// Destination for outbound console messages
#[async_trait]
pub trait OscSink: Send + Sync {
    /// Send one message as a single datagram
    async fn send(&self, msg: OscMessage) -> Result<()>;

    /// Human-readable peer description for logs
    fn peer(&self) -> String {
        "console".to_string()
    }
}

/// UDP socket bound locally and aimed at the console
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl UdpTransport {
    /// Bind the local port and spawn the reader task
    ///
    /// Returns the sending half and the stream of decoded inbound messages.
    pub async fn bind(
        local_port: u16,
        remote: SocketAddr,
    ) -> Result<(Arc<Self>, mpsc::Receiver<OscMessage>)> {
        let socket = UdpSocket::bind(("0.0.0.0", local_port))
            .await
            .with_context(|| format!("Failed to bind UDP socket on port {}", local_port))?;
        let socket = Arc::new(socket);

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        tokio::spawn(read_loop(socket.clone(), inbound_tx));

        Ok((Arc::new(Self { socket, remote }), inbound_rx))
    }
}

#[async_trait]
impl OscSink for UdpTransport {
    async fn send(&self, msg: OscMessage) -> Result<()> {
        let addr = msg.addr.clone();
        let bytes = rosc::encoder::encode(&OscPacket::Message(msg))
            .with_context(|| format!("Failed to encode OSC message {}", addr))?;
        self.socket
            .send_to(&bytes, self.remote)
            .await
            .with_context(|| format!("Failed to send {} to {}", addr, self.remote))?;
        Ok(())
    }

    fn peer(&self) -> String {
        self.remote.to_string()
    }
}

/// Resolve the console host and port to a socket address
pub async fn resolve_remote(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve mixer address {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for mixer {}:{}", host, port))
}

/// Flatten bundles into their contained messages
pub fn flatten_packet(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten_packet(inner, out);
            }
        }
    }
}

async fn read_loop(socket: Arc<UdpSocket>, inbound_tx: mpsc::Sender<OscMessage>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // ICMP port-unreachable surfaces here on some platforms
                warn!("UDP receive error: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let packet = match rosc::decoder::decode_udp(&buf[..len]) {
            Ok((_, packet)) => packet,
            Err(e) => {
                debug!(%from, "Discarding undecodable datagram: {:?}", e);
                continue;
            }
        };

        let mut messages = Vec::new();
        flatten_packet(packet, &mut messages);
        for msg in messages {
            trace!(%from, addr = %msg.addr, "Datagram received");
            if inbound_tx.send(msg).await.is_err() {
                debug!("Inbound channel closed, stopping UDP reader");
                return;
            }
        }
    }
}
