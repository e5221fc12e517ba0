//! Configuration management for the mixer gateway
//!
//! Settings come from an optional YAML file, then command-line / environment
//! overrides are applied on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mixer: MixerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Console connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MixerConfig {
    /// Console IP address or hostname
    #[serde(default)]
    pub host: String,
    /// Console OSC port
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
    /// Local UDP port replies arrive on
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Present meter levels in dB instead of fader units
    #[serde(default)]
    pub decibels: bool,
}

/// HTTP / WebSocket server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Directory of static UI files served at `/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mixer_host: Option<String>,
    pub http_port: Option<u16>,
    pub udp_remote_port: Option<u16>,
    pub udp_local_port: Option<u16>,
    pub decibels: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            remote_port: default_remote_port(),
            local_port: default_local_port(),
            decibels: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    ///
    /// Validation is left to the caller so overrides can be applied first.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply command-line / environment values over the file settings
    pub fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(host) = overrides.mixer_host {
            self.mixer.host = host;
        }
        if let Some(port) = overrides.http_port {
            self.server.port = port;
        }
        if let Some(port) = overrides.udp_remote_port {
            self.mixer.remote_port = port;
        }
        if let Some(port) = overrides.udp_local_port {
            self.mixer.local_port = port;
        }
        if overrides.decibels {
            self.mixer.decibels = true;
        }
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.mixer.host.trim().is_empty() {
            anyhow::bail!("Mixer host is not set (use --mixer-ip, MIXER_IP or mixer.host)");
        }
        if self.mixer.remote_port == 0 {
            anyhow::bail!("Mixer remote_port cannot be 0");
        }
        if let Some(dir) = &self.server.static_dir {
            if !dir.is_dir() {
                anyhow::bail!("Static directory does not exist: {}", dir.display());
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_remote_port() -> u16 { 10024 }
fn default_local_port() -> u16 { 57121 }
fn default_bind() -> IpAddr { IpAddr::from([0, 0, 0, 0]) }
fn default_http_port() -> u16 { crate::hub::DEFAULT_HTTP_PORT }
