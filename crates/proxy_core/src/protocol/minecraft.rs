//! Minecraft server-list-ping listener.
//!
//! Implements just enough of the handshake → status/login flow to answer a
//! server-list query and to notice a join attempt. Per connection the flow
//! is a small state machine: Handshake, then either Status (+optional
//! ping/pong echo) or Login (wake trigger + disconnect), then Closed.
//! Gameplay traffic is never proxied.

use crate::error::ProxyError;
use crate::orchestrator::WakeEvent;
use crate::protocol::varint::{encode_string, encode_varint, read_varint, PacketCursor};
use crate::protocol::ListenerHandle;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Handshake, status request/response and login packets all use id 0x00.
const PACKET_ID_HANDSHAKE: u32 = 0x00;
const PACKET_ID_STATUS_RESPONSE: u32 = 0x00;
const PACKET_ID_DISCONNECT: u32 = 0x00;
/// Ping/pong packet id during the status flow.
const PACKET_ID_PING: u8 = 0x01;

const NEXT_STATE_STATUS: u32 = 1;
const NEXT_STATE_LOGIN: u32 = 2;

/// Upper bound on an inbound frame; handshake-phase packets are tiny and
/// anything larger is a protocol violation.
const MAX_PACKET_LEN: u32 = 4096;

/// Budget for one whole client exchange; stuck connections are cut off
/// instead of accumulating.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Message shown to a player whose join attempt triggered the wake.
const DISCONNECT_TEXT: &str = "Server is starting, please retry in 60 seconds";

/// Shared source for the status response contents.
///
/// The orchestrator flips the `starting` flag when a wake goes out; the
/// listener only ever reads, so a relaxed atomic is all the coordination
/// needed.
pub struct StatusProvider {
    motd_idle: String,
    motd_starting: String,
    version_label: String,
    starting: AtomicBool,
}

impl StatusProvider {
    /// Creates a provider in the idle state.
    pub fn new(motd_idle: String, motd_starting: String, version_label: String) -> Self {
        Self {
            motd_idle,
            motd_starting,
            version_label,
            starting: AtomicBool::new(false),
        }
    }

    /// Switches between the idle and starting MOTD variants.
    pub fn set_starting(&self, starting: bool) {
        self.starting.store(starting, Ordering::Relaxed);
    }

    /// Whether a wake has been triggered during the current outage.
    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::Relaxed)
    }

    /// The MOTD for the current state.
    pub fn motd(&self) -> &str {
        if self.is_starting() {
            &self.motd_starting
        } else {
            &self.motd_idle
        }
    }

    /// Builds the status JSON for a client that declared `client_protocol`.
    ///
    /// The client's own protocol number is echoed back so the server list
    /// never shows the "outdated client/server" banner.
    pub fn status_json(&self, client_protocol: u32) -> serde_json::Value {
        json!({
            "version": { "name": self.version_label, "protocol": client_protocol },
            "players": { "max": 0, "online": 0 },
            "description": { "text": self.motd() },
        })
    }
}

/// TCP listener speaking the server-list-ping subset.
pub struct MinecraftListener;

impl MinecraftListener {
    /// Binds `bind_addr` and starts accepting connections.
    ///
    /// # Errors
    ///
    /// `ProxyError::Listener` when the address cannot be bound (typically
    /// because the claim has not landed yet); the caller retries.
    pub async fn start(
        bind_addr: SocketAddr,
        status: Arc<StatusProvider>,
        wake_tx: mpsc::Sender<WakeEvent>,
    ) -> Result<ListenerHandle, ProxyError> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ProxyError::Listener(format!("failed to bind {bind_addr}: {e}")))?;
        info!("Minecraft listener on {}", bind_addr);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(accept_loop(listener, status, wake_tx, shutdown_rx));
        Ok(ListenerHandle::new("minecraft", shutdown_tx, vec![task]))
    }
}

async fn accept_loop(
    listener: TcpListener,
    status: Arc<StatusProvider>,
    wake_tx: mpsc::Sender<WakeEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let status = status.clone();
                    let wake_tx = wake_tx.clone();
                    connections.spawn(async move {
                        match tokio::time::timeout(
                            CLIENT_TIMEOUT,
                            handle_client(stream, peer, &status, &wake_tx),
                        )
                        .await
                        {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => debug!("Minecraft client {}: {}", peer, e),
                            Err(_) => debug!("Minecraft client {} timed out", peer),
                        }
                    });
                }
                Err(e) => warn!("Minecraft accept failed: {}", e),
            },
        }
    }
    // Wake-and-disconnect semantics: no graceful drain, cut everything.
    connections.shutdown().await;
}

/// Reads one framed packet payload.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProxyError> {
    let len = read_varint(reader).await?;
    if len > MAX_PACKET_LEN {
        return Err(ProxyError::Protocol(format!("oversized packet ({len} bytes)")));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Writes `payload` as one framed packet.
async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProxyError> {
    let mut frame = encode_varint(payload.len() as u32);
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Runs the per-connection state machine to completion.
///
/// Any error aborts only this connection; the accept loop keeps running.
async fn handle_client<S>(
    mut stream: S,
    peer: SocketAddr,
    status: &StatusProvider,
    wake_tx: &mpsc::Sender<WakeEvent>,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = read_frame(&mut stream).await?;
    let mut cursor = PacketCursor::new(&payload);

    let packet_id = cursor.read_varint()?;
    if packet_id != PACKET_ID_HANDSHAKE {
        return Err(ProxyError::Protocol(format!(
            "unexpected first packet id {packet_id:#04x}"
        )));
    }
    let protocol_version = cursor.read_varint()?;
    let _server_address = cursor.read_string()?;
    let _server_port = cursor.read_u16()?;
    let next_state = cursor.read_varint()?;

    match next_state {
        NEXT_STATE_STATUS => handle_status(&mut stream, protocol_version, status).await,
        NEXT_STATE_LOGIN => handle_login(&mut stream, peer, wake_tx).await,
        other => Err(ProxyError::Protocol(format!("unsupported next state {other}"))),
    }
}

/// Status flow: request → JSON response → optional ping/pong echo.
async fn handle_status<S>(
    stream: &mut S,
    client_protocol: u32,
    status: &StatusProvider,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Status request; its payload carries no information.
    let _request = read_frame(stream).await?;

    let response = status.status_json(client_protocol).to_string();
    let mut payload = encode_varint(PACKET_ID_STATUS_RESPONSE);
    payload.extend_from_slice(&encode_string(&response));
    write_frame(stream, &payload).await?;

    // The ping is optional; clients may hang up right after the response.
    match read_frame(stream).await {
        Ok(ping) if ping.first() == Some(&PACKET_ID_PING) && ping.len() >= 9 => {
            write_frame(stream, &ping).await?;
        }
        Ok(_) => {}
        Err(ProxyError::Io(_)) => {}
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Login flow: report the join attempt, then disconnect with the starting
/// message.
async fn handle_login<S>(
    stream: &mut S,
    peer: SocketAddr,
    wake_tx: &mpsc::Sender<WakeEvent>,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Login start payload (player name/uuid) is irrelevant; reading it is
    // best-effort so truncated clients still trigger the wake.
    if let Err(e) = read_frame(stream).await {
        debug!("Login start read from {} failed: {}", peer, e);
    }

    let event = WakeEvent {
        reason: format!("minecraft login attempt from {peer}"),
    };
    if wake_tx.send(event).await.is_err() {
        warn!("Wake channel closed; login attempt from {} dropped", peer);
    }

    let message = json!({ "text": DISCONNECT_TEXT }).to_string();
    let mut payload = encode_varint(PACKET_ID_DISCONNECT);
    payload.extend_from_slice(&encode_string(&message));
    write_frame(stream, &payload).await
}
