//! IP ownership management.
//!
//! Detects which interface and subnet own the target address, claims the
//! address as a secondary on that interface while the real server sleeps,
//! announces the takeover via gratuitous ARP, and hands the address back
//! the moment the real server is reachable again.

use crate::command::CommandExecutor;
use crate::error::ProxyError;
use crate::net::subnet_broadcast;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gratuitous ARP announcements sent after a claim.
const ARP_ANNOUNCE_COUNT: usize = 2;

/// Pause between gratuitous ARP announcements.
const ARP_ANNOUNCE_SPACING: Duration = Duration::from_millis(200);

/// Detected interface binding for the target address.
///
/// Populated lazily on the first claim attempt and kept for the process
/// lifetime; the interface is assumed stable.
#[derive(Debug, Clone)]
struct NetworkBinding {
    iface: String,
    prefix_len: u8,
}

/// Manages the takeover and handover of the target address.
///
/// Claim and release are idempotent, so the orchestrator can call them on
/// every poll without tracking whether they already happened.
pub struct IpOwnership {
    target_ip: Ipv4Addr,
    prefix_override: Option<u8>,
    executor: Arc<dyn CommandExecutor>,
    binding: Option<NetworkBinding>,
    claimed: bool,
}

impl IpOwnership {
    /// Creates a new manager for `target_ip`.
    ///
    /// `prefix_override`, when set, wins over the prefix length detected
    /// from the interface's own address entry.
    pub fn new(
        target_ip: Ipv4Addr,
        prefix_override: Option<u8>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            target_ip,
            prefix_override,
            executor,
            binding: None,
            claimed: false,
        }
    }

    /// Whether the target address is currently claimed on the interface.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Resolves the interface and prefix length owning the target address.
    ///
    /// Queries the routing table for the outbound interface, then the
    /// interface's IPv4 address entries for the subnet size. The result is
    /// cached; detection runs at most once per process.
    ///
    /// # Errors
    ///
    /// `ProxyError::Detection` if no route to the target exists or the
    /// interface carries no IPv4 address entry. The caller retries on the
    /// next OFFLINE-entry attempt.
    pub async fn detect_binding(&mut self) -> Result<(String, u8), ProxyError> {
        if let Some(binding) = &self.binding {
            return Ok((binding.iface.clone(), binding.prefix_len));
        }

        let target = self.target_ip.to_string();
        let route = self
            .executor
            .run(&["ip", "route", "get", &target])
            .await?;
        if !route.success {
            return Err(ProxyError::Detection(format!(
                "route lookup for {} failed: {}",
                target,
                route.stderr.trim()
            )));
        }
        let iface = parse_route_iface(&route.stdout).ok_or_else(|| {
            ProxyError::Detection(format!("no interface in route output: {}", route.stdout.trim()))
        })?;

        let prefix_len = match self.prefix_override {
            Some(len) => len,
            None => {
                let addrs = self
                    .executor
                    .run(&["ip", "-o", "-f", "inet", "addr", "show", "dev", &iface])
                    .await?;
                if !addrs.success {
                    return Err(ProxyError::Detection(format!(
                        "address listing for {} failed: {}",
                        iface,
                        addrs.stderr.trim()
                    )));
                }
                parse_prefix_len(&addrs.stdout).ok_or_else(|| {
                    ProxyError::Detection(format!("no IPv4 address entry on {iface}"))
                })?
            }
        };

        info!("Detected iface={}, prefix=/{}", iface, prefix_len);
        self.binding = Some(NetworkBinding {
            iface: iface.clone(),
            prefix_len,
        });
        Ok((iface, prefix_len))
    }

    /// Claims the target address as a secondary on the detected interface.
    ///
    /// Idempotent: a repeat call while claimed is a no-op, and an "address
    /// already present" answer from the OS counts as success. After the
    /// add, two spaced gratuitous ARP announcements nudge neighbor caches
    /// toward the proxy; those are best-effort.
    ///
    /// # Errors
    ///
    /// `ProxyError::Claim` on any other add failure; the caller retries on
    /// the next poll.
    pub async fn claim(&mut self) -> Result<(), ProxyError> {
        if self.claimed {
            return Ok(());
        }
        let (iface, prefix_len) = self.detect_binding().await?;

        let address = format!("{}/{}", self.target_ip, prefix_len);
        let added = self
            .executor
            .run(&["ip", "addr", "add", &address, "dev", &iface])
            .await?;
        if !added.success && !added.stderr.contains("File exists") {
            return Err(ProxyError::Claim(format!(
                "ip addr add {} on {} failed: {}",
                address,
                iface,
                added.stderr.trim()
            )));
        }

        let target = self.target_ip.to_string();
        for announce in 0..ARP_ANNOUNCE_COUNT {
            if announce > 0 {
                tokio::time::sleep(ARP_ANNOUNCE_SPACING).await;
            }
            match self
                .executor
                .run(&["arping", "-U", "-I", &iface, "-c", "1", &target])
                .await
            {
                Ok(output) if !output.success => {
                    debug!("Gratuitous ARP announce failed: {}", output.stderr.trim());
                }
                Err(e) => debug!("Gratuitous ARP announce failed to run: {}", e),
                Ok(_) => {}
            }
        }

        self.claimed = true;
        info!("Claimed IP {} on {}", address, iface);
        Ok(())
    }

    /// Releases the claimed address.
    ///
    /// Idempotent and never fatal: "address not present" and "interface
    /// gone" answers mean the address is already effectively released, and
    /// any other failure is logged while the daemon keeps running.
    pub async fn release(&mut self) {
        if !self.claimed {
            return;
        }
        let Some(binding) = self.binding.clone() else {
            self.claimed = false;
            return;
        };

        let address = format!("{}/{}", self.target_ip, binding.prefix_len);
        match self
            .executor
            .run(&["ip", "addr", "del", &address, "dev", &binding.iface])
            .await
        {
            Ok(output) if !output.success => {
                if output.stderr.contains("Cannot assign requested address")
                    || output.stderr.contains("Cannot find device")
                {
                    debug!("Address {} already gone from {}", address, binding.iface);
                } else {
                    warn!(
                        "Failed to delete {} from {}: {}",
                        address,
                        binding.iface,
                        output.stderr.trim()
                    );
                }
            }
            Err(e) => warn!("Failed to run address delete: {}", e),
            Ok(_) => {}
        }

        self.claimed = false;
        info!("Released IP {} from {}", address, binding.iface);
    }

    /// Broadcast addresses relevant for waking the target.
    ///
    /// Prefers the interface-reported broadcast addresses; when the
    /// interface reports none, falls back to the arithmetic subnet
    /// broadcast. The limited broadcast `255.255.255.255` is appended by
    /// the caller, keeping this component a pure view of the interface.
    pub async fn broadcast_addresses(&mut self) -> Result<Vec<Ipv4Addr>, ProxyError> {
        let (iface, prefix_len) = self.detect_binding().await?;

        let addrs = self
            .executor
            .run(&["ip", "-o", "-f", "inet", "addr", "show", "dev", &iface])
            .await?;
        let mut broadcasts = if addrs.success {
            parse_broadcasts(&addrs.stdout)
        } else {
            Vec::new()
        };

        if broadcasts.is_empty() {
            broadcasts.push(subnet_broadcast(self.target_ip, prefix_len));
        }
        Ok(broadcasts)
    }
}

/// Extracts the interface token from `ip route get` output.
///
/// Sample: `10.0.0.50 dev eth0 src 10.0.0.2 uid 0`
fn parse_route_iface(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "dev" {
            return tokens.next().map(|iface| iface.to_string());
        }
    }
    None
}

/// Extracts the first prefix length from `ip -o -f inet addr show` output.
///
/// Sample line: `2: eth0    inet 10.0.0.2/24 brd 10.0.0.255 scope global eth0`
fn parse_prefix_len(output: &str) -> Option<u8> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "inet" {
            let address = tokens.next()?;
            let (_, prefix) = address.split_once('/')?;
            return prefix.parse().ok();
        }
    }
    None
}

/// Extracts every `brd` address, deduplicated in order of appearance.
fn parse_broadcasts(output: &str) -> Vec<Ipv4Addr> {
    let mut broadcasts: Vec<Ipv4Addr> = Vec::new();
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "brd" {
            if let Some(addr) = tokens.next().and_then(|a| a.parse().ok()) {
                if !broadcasts.contains(&addr) {
                    broadcasts.push(addr);
                }
            }
        }
    }
    broadcasts
}
