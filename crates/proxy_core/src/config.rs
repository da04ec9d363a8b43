//! Core proxy configuration.
//!
//! The record is assembled once at startup (the binary crate owns the TOML
//! file and CLI overrides) and treated as read-only input afterwards.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Default Minecraft server port
fn default_minecraft_port() -> u16 {
    25565
}

/// Default MOTD shown while the real server sleeps
fn default_motd_idle() -> String {
    "Join to start Server".to_string()
}

/// Default MOTD shown once a wake has been triggered
fn default_motd_starting() -> String {
    "Starting...".to_string()
}

/// Default version label shown in the server list
fn default_version_label() -> String {
    "Offline".to_string()
}

/// Default UDP ports watched for discovery probes
fn default_presence_ports() -> Vec<u16> {
    vec![15000, 15777, 7777]
}

/// Default seconds between reachability probes
fn default_probe_interval() -> u64 {
    3
}

/// Default consecutive probe failures before the proxy takes over
fn default_fail_threshold() -> u32 {
    10
}

/// Immutable-after-load configuration for the orchestration core.
///
/// Loaded once at startup; the core never mutates it and never reloads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// IPv4 address of the real game server (the address the proxy claims)
    pub target_ip: Ipv4Addr,

    /// Hardware address of the real server, for the Wake-on-LAN packet
    pub target_mac: String,

    /// Subnet prefix length override; `None` means detect from the interface
    #[serde(default)]
    pub prefix_len: Option<u8>,

    /// TCP port for the Minecraft listener
    #[serde(default = "default_minecraft_port")]
    pub minecraft_port: u16,

    /// Server-list description while nothing has been woken yet
    #[serde(default = "default_motd_idle")]
    pub motd_idle: String,

    /// Server-list description once a wake is in flight
    #[serde(default = "default_motd_starting")]
    pub motd_starting: String,

    /// Version name shown in the server list
    #[serde(default = "default_version_label")]
    pub version_label: String,

    /// UDP ports bound as silent presence sinks
    #[serde(default = "default_presence_ports")]
    pub presence_ports: Vec<u16>,

    /// Seconds between reachability probes
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Consecutive probe failures required before entering OFFLINE
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: u32,
}

impl ProxyConfig {
    /// Probe timeout in seconds, clamped so it never exceeds the poll
    /// interval and never drops below one second.
    pub fn probe_timeout_secs(&self) -> u64 {
        self.probe_interval_secs.max(1)
    }

    /// Failure threshold with the lower bound applied; a single dropped
    /// probe must never flip state, but a threshold of zero still means
    /// "react on the first failure".
    pub fn effective_threshold(&self) -> u32 {
        self.fail_threshold.max(1)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_ip: Ipv4Addr::new(192, 168, 1, 50),
            target_mac: "aa:bb:cc:dd:ee:ff".to_string(),
            prefix_len: None,
            minecraft_port: default_minecraft_port(),
            motd_idle: default_motd_idle(),
            motd_starting: default_motd_starting(),
            version_label: default_version_label(),
            presence_ports: default_presence_ports(),
            probe_interval_secs: default_probe_interval(),
            fail_threshold: default_fail_threshold(),
        }
    }
}
