//! Configuration management for the wake-on-demand proxy daemon.
//!
//! This module handles loading, validation, and conversion of daemon
//! configuration from TOML files and command-line arguments.

use anyhow::Result;
use proxy_core::net::wol::parse_mac;
use proxy_core::ProxyConfig;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Default Minecraft server port
fn default_minecraft_port() -> u16 {
    25565
}

/// Default MOTD while the real server sleeps
fn default_motd_idle() -> String {
    "Join to start Server".to_string()
}

/// Default MOTD once a wake is in flight
fn default_motd_starting() -> String {
    "Starting...".to_string()
}

/// Default version label shown in the server list
fn default_version_label() -> String {
    "Offline".to_string()
}

/// Default UDP discovery ports watched by the presence sink
fn default_presence_ports() -> Vec<u16> {
    vec![15000, 15777, 7777]
}

/// Default seconds between reachability probes
fn default_probe_interval() -> u64 {
    3
}

/// Default consecutive failures before the proxy takes over
fn default_fail_threshold() -> u32 {
    10
}

/// Default log level filter
fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure encompassing the target
/// server, both listeners, probing behavior, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target server settings
    pub server: ServerSettings,
    /// Minecraft listener settings
    #[serde(default)]
    pub minecraft: MinecraftSettings,
    /// Presence sink settings
    #[serde(default)]
    pub presence: PresenceSettings,
    /// Liveness probing settings
    #[serde(default)]
    pub probe: ProbeSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// The machine the proxy stands in for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// IPv4 address of the real game server
    pub target_ip: String,
    /// Hardware address of the real game server, for Wake-on-LAN
    pub target_mac: String,
    /// Subnet prefix length override; omit to detect from the interface
    #[serde(default)]
    pub prefix_len: Option<u8>,
}

/// Minecraft listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinecraftSettings {
    /// TCP port the listener binds on the claimed address
    #[serde(default = "default_minecraft_port")]
    pub port: u16,
    /// Server-list description while nothing has been woken yet
    #[serde(default = "default_motd_idle")]
    pub motd_idle: String,
    /// Server-list description once a wake is in flight
    #[serde(default = "default_motd_starting")]
    pub motd_starting: String,
    /// Version name shown in the server list
    #[serde(default = "default_version_label")]
    pub version_label: String,
}

impl Default for MinecraftSettings {
    fn default() -> Self {
        Self {
            port: default_minecraft_port(),
            motd_idle: default_motd_idle(),
            motd_starting: default_motd_starting(),
            version_label: default_version_label(),
        }
    }
}

/// Presence sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSettings {
    /// UDP ports bound as silent discovery sinks
    #[serde(default = "default_presence_ports")]
    pub ports: Vec<u16>,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            ports: default_presence_ports(),
        }
    }
}

/// Liveness probing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Seconds between reachability probes
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
    /// Consecutive probe failures before the proxy takes over
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: u32,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
            fail_threshold: default_fail_threshold(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                target_ip: "192.168.1.50".to_string(),
                target_mac: "aa:bb:cc:dd:ee:ff".to_string(),
                prefix_len: None,
            },
            minecraft: MinecraftSettings::default(),
            presence: PresenceSettings::default(),
            probe: ProbeSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration so the
    /// daemon can start; the placeholder target should then be edited.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string
    /// describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.target_ip.parse::<Ipv4Addr>().is_err() {
            return Err(format!("Invalid target IP: {}", self.server.target_ip));
        }

        if parse_mac(&self.server.target_mac).is_err() {
            return Err(format!("Invalid target MAC: {}", self.server.target_mac));
        }

        if let Some(prefix_len) = self.server.prefix_len {
            if prefix_len == 0 || prefix_len > 32 {
                return Err(format!("Invalid prefix length: {prefix_len}"));
            }
        }

        if self.minecraft.port == 0 {
            return Err("Minecraft port cannot be 0".to_string());
        }

        if self.presence.ports.contains(&0) {
            return Err("Presence ports cannot contain 0".to_string());
        }

        if self.probe.interval_secs == 0 {
            return Err("Probe interval must be at least 1 second".to_string());
        }

        if self.probe.fail_threshold == 0 {
            return Err("Failure threshold must be at least 1".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    /// Converts the application configuration into the core proxy
    /// configuration.
    ///
    /// Call [`validate`](Self::validate) first; this only fails on an
    /// unparseable target address.
    pub fn to_proxy_config(&self) -> Result<ProxyConfig> {
        Ok(ProxyConfig {
            target_ip: self.server.target_ip.parse()?,
            target_mac: self.server.target_mac.clone(),
            prefix_len: self.server.prefix_len,
            minecraft_port: self.minecraft.port,
            motd_idle: self.minecraft.motd_idle.clone(),
            motd_starting: self.minecraft.motd_starting.clone(),
            version_label: self.minecraft.version_label.clone(),
            presence_ports: self.presence.ports.clone(),
            probe_interval_secs: self.probe.interval_secs,
            fail_threshold: self.probe.fail_threshold,
        })
    }
}
