//! Mixer GW - browser remote for Behringer X-Air / X32 consoles
//!
//! Bridges the console's OSC/UDP interface to WebSocket clients.

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixer_gw::config::{AppConfig, CliOverrides};
use mixer_gw::hub::{
    self, BroadcastTimings, Broadcaster, ClientRegistry, HubState, BROADCAST_CAPACITY,
};
use mixer_gw::mixer::LevelScale;
use mixer_gw::session::{
    resolve_remote, MixerSession, SessionError, SessionHandle, SessionTimings, UdpTransport,
};

/// Delay between a fatal session error and process exit, so the log line is seen
const FATAL_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Mixer Gateway - control X-Air / X32 bus sends from a browser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Console IP address or hostname
    #[arg(long, env = "MIXER_IP")]
    mixer_ip: Option<String>,

    /// HTTP / WebSocket port
    #[arg(long, env = "PORT")]
    http_port: Option<u16>,

    /// Console OSC port
    #[arg(long, env = "UDP_REMOTE_PORT")]
    udp_remote_port: Option<u16>,

    /// Local UDP port
    #[arg(long, env = "UDP_LOCAL_PORT")]
    udp_local_port: Option<u16>,

    /// Report meter levels in dB
    #[arg(long)]
    decibels: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            mixer_host: self.mixer_ip.clone(),
            http_port: self.http_port,
            udp_remote_port: self.udp_remote_port,
            udp_local_port: self.udp_local_port,
            decibels: self.decibels,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting Mixer GW v{}...", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            AppConfig::load(path).await?
        }
        None => AppConfig::default(),
    };
    config.apply_overrides(args.overrides());
    config.validate()?;

    if let Err(e) = run_app(config).await {
        error!("{:#}", e);
        tokio::time::sleep(FATAL_EXIT_GRACE).await;
        std::process::exit(1);
    }

    info!("Mixer GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig) -> Result<()> {
    let remote = resolve_remote(&config.mixer.host, config.mixer.remote_port).await?;
    let (transport, inbound_rx) = UdpTransport::bind(config.mixer.local_port, remote).await?;
    info!(
        "UDP port {} open, mixer at {}",
        config.mixer.local_port, remote
    );

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let clients = ClientRegistry::new();
    let (session, session_handle) = MixerSession::new(
        transport,
        inbound_rx,
        notify_tx,
        clients.clone(),
        LevelScale::from_decibels_flag(config.mixer.decibels),
        SessionTimings::default(),
    );
    let reader = session.reader();

    let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let broadcaster = Broadcaster::new(
        notify_rx,
        reader.clone(),
        events_tx.clone(),
        BroadcastTimings::default(),
    );
    tokio::spawn(broadcaster.run());

    let hub_state = Arc::new(HubState {
        reader,
        session: session_handle.clone(),
        events: events_tx,
        clients,
    });
    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel();
    let server = tokio::spawn(hub::start_server(
        hub_state,
        config.server.socket_addr(),
        config.server.static_dir.clone(),
        server_shutdown_rx,
    ));

    let session_task = tokio::spawn(session.run());

    supervise(
        session_task,
        server,
        session_handle,
        server_shutdown_tx,
        tokio::signal::ctrl_c(),
    )
    .await
}

/// Wait for the first of: session exit, server exit, shutdown signal
///
/// The HTTP server stopping on its own is always an error.
async fn supervise(
    mut session_task: JoinHandle<Result<(), SessionError>>,
    mut server: JoinHandle<Result<()>>,
    session_handle: SessionHandle,
    server_shutdown_tx: oneshot::Sender<()>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    let (result, server_running) = tokio::select! {
        joined = &mut session_task => {
            let result = match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e)),
                Err(e) => Err(anyhow::Error::new(e).context("Mixer session task panicked")),
            };
            (result, true)
        }
        served = &mut server => {
            session_handle.shutdown();
            let result = match served {
                Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
            };
            (result, false)
        }
        signal = shutdown => {
            let result = signal.context("Failed to listen for Ctrl+C");
            info!("Shutdown signal received");
            session_handle.shutdown();
            let _ = session_task.await;
            (result, true)
        }
    };

    if server_running {
        let _ = server_shutdown_tx.send(());
        match server.await {
            Ok(Err(e)) if result.is_ok() => return Err(e),
            Ok(Err(e)) => error!("HTTP server error: {:#}", e),
            Err(e) => error!("HTTP server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    result
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
