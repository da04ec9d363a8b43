//! Presence listener: silent UDP discovery sinks.
//!
//! Game clients discover servers by probing well-known UDP ports. The
//! proxy binds those ports on the claimed address and treats any inbound
//! datagram as "someone is looking for the server" - it never answers,
//! because the goal is only to notice the query, not to impersonate the
//! discovery protocol.

use crate::error::ProxyError;
use crate::orchestrator::WakeEvent;
use crate::protocol::ListenerHandle;
use std::net::IpAddr;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// UDP sinks over the configured presence ports.
pub struct PresenceListener;

impl PresenceListener {
    /// Binds every port on `bind_ip` and starts sinking datagrams.
    ///
    /// All sockets are bound before any task starts, so a failure on one
    /// port leaves nothing running.
    ///
    /// # Errors
    ///
    /// `ProxyError::Listener` when a port cannot be bound; the caller
    /// retries on the next poll.
    pub async fn start(
        bind_ip: IpAddr,
        ports: &[u16],
        wake_tx: mpsc::Sender<WakeEvent>,
    ) -> Result<ListenerHandle, ProxyError> {
        let mut sockets = Vec::with_capacity(ports.len());
        for &port in ports {
            let socket = UdpSocket::bind((bind_ip, port)).await.map_err(|e| {
                ProxyError::Listener(format!("failed to bind {bind_ip}:{port}/udp: {e}"))
            })?;
            info!("Presence listener on {}:{}/udp", bind_ip, port);
            sockets.push((port, socket));
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let tasks = sockets
            .into_iter()
            .map(|(port, socket)| {
                tokio::spawn(sink_loop(
                    socket,
                    port,
                    wake_tx.clone(),
                    shutdown_tx.subscribe(),
                ))
            })
            .collect();
        Ok(ListenerHandle::new("presence", shutdown_tx, tasks))
    }
}

async fn sink_loop(
    socket: UdpSocket,
    port: u16,
    wake_tx: mpsc::Sender<WakeEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut buf = [0u8; 2048];
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((_, peer)) => {
                    // The datagram itself is the signal; its contents are
                    // ignored and nothing is sent back.
                    let event = WakeEvent {
                        reason: format!("presence query from {peer} on port {port}"),
                    };
                    if wake_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Presence recv on port {} failed: {}", port, e),
            },
        }
    }
}
