//! Integration tests for the full wake-on-demand cycle
//!
//! These tests drive the orchestrator's control loop end-to-end against a
//! scripted command executor: takeover after the failure streak, a real
//! status exchange over TCP, the login-triggered wake with early release,
//! and the handover once the "real server" becomes reachable again.

use async_trait::async_trait;
use proxy_core::protocol::varint::{encode_string, encode_varint, read_varint};
use proxy_core::{
    CommandExecutor, CommandOutput, Orchestrator, ProxyConfig, ProxyError,
};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout, Duration, Instant};

/// Scripted host: reachability is a switch the test flips, network
/// commands answer plausibly for loopback.
struct ScriptedHost {
    server_up: AtomicBool,
}

impl ScriptedHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            server_up: AtomicBool::new(false),
        })
    }

    fn set_up(&self, up: bool) {
        self.server_up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandExecutor for ScriptedHost {
    async fn run(&self, argv: &[&str]) -> Result<CommandOutput, ProxyError> {
        let output = match argv {
            ["ping", ..] => {
                if self.server_up.load(Ordering::SeqCst) {
                    CommandOutput::ok("1 packets transmitted, 1 received")
                } else {
                    CommandOutput::failed("1 packets transmitted, 0 received")
                }
            }
            ["ip", "route", "get", ..] => {
                CommandOutput::ok("local 127.0.0.1 dev lo src 127.0.0.1 uid 0")
            }
            ["ip", "-o", "-f", "inet", "addr", "show", ..] => {
                CommandOutput::ok("1: lo    inet 127.0.0.1/8 scope host lo")
            }
            ["ip", "addr", ..] | ["arping", ..] => CommandOutput::ok(""),
            other => CommandOutput::failed(format!("unexpected command: {other:?}")),
        };
        Ok(output)
    }
}

fn free_tcp_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);
    port
}

fn free_udp_port() -> u16 {
    let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);
    port
}

fn test_config(minecraft_port: u16, presence_ports: Vec<u16>) -> ProxyConfig {
    ProxyConfig {
        target_ip: Ipv4Addr::new(127, 0, 0, 1),
        target_mac: "aa:bb:cc:dd:ee:ff".to_string(),
        prefix_len: None,
        minecraft_port,
        motd_idle: "Join to start Server".to_string(),
        motd_starting: "Starting...".to_string(),
        version_label: "Offline".to_string(),
        presence_ports,
        probe_interval_secs: 1,
        fail_threshold: 2,
    }
}

async fn wait_for_listener(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        assert!(Instant::now() < deadline, "listener never came up on {port}");
        sleep(Duration::from_millis(100)).await;
    }
}

async fn wait_for_released(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            return;
        }
        assert!(Instant::now() < deadline, "listener never released port {port}");
        sleep(Duration::from_millis(100)).await;
    }
}

fn handshake_frame(protocol_version: u32, next_state: u32) -> Vec<u8> {
    let mut payload = encode_varint(0x00);
    payload.extend_from_slice(&encode_varint(protocol_version));
    payload.extend_from_slice(&encode_string("mc.example.net"));
    payload.extend_from_slice(&25565u16.to_be_bytes());
    payload.extend_from_slice(&encode_varint(next_state));
    frame(&payload)
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = encode_varint(payload.len() as u32);
    framed.extend_from_slice(payload);
    framed
}

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let len = read_varint(stream).await.unwrap();
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}

/// Runs a status exchange and returns the parsed JSON body.
async fn query_status(stream: &mut TcpStream, protocol_version: u32) -> serde_json::Value {
    stream.write_all(&handshake_frame(protocol_version, 1)).await.unwrap();
    stream.write_all(&frame(&encode_varint(0x00))).await.unwrap();

    let payload = read_frame(stream).await;
    assert_eq!(payload.first(), Some(&0x00));
    // Skip the packet id, then the string length prefix.
    let mut reader = &payload[1..];
    let json_len = read_varint(&mut reader).await.unwrap() as usize;
    serde_json::from_slice(&reader[..json_len]).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_wake_cycle_over_minecraft_login() {
    let mc_port = free_tcp_port();
    let host = ScriptedHost::new();
    let orchestrator = Orchestrator::new(test_config(mc_port, vec![]), host.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_handle = tokio::spawn(orchestrator.run(shutdown_rx));

    // Two failed probes take the proxy OFFLINE and bring the listener up.
    let mut stream = wait_for_listener(mc_port).await;

    // Status exchange echoes the client protocol and the idle MOTD.
    let status = query_status(&mut stream, 765).await;
    assert_eq!(status["version"]["protocol"], 765);
    assert_eq!(status["description"]["text"], "Join to start Server");
    drop(stream);

    // A login attempt wakes the machine and disconnects with the starting
    // message.
    let mut login = wait_for_listener(mc_port).await;
    login.write_all(&handshake_frame(765, 2)).await.unwrap();
    let mut login_start = encode_varint(0x00);
    login_start.extend_from_slice(&encode_string("steve"));
    login.write_all(&frame(&login_start)).await.unwrap();

    let disconnect = read_frame(&mut login).await;
    assert_eq!(disconnect.first(), Some(&0x00));
    let text = String::from_utf8_lossy(&disconnect[1..]);
    assert!(text.contains("starting"), "unexpected disconnect: {text}");
    drop(login);

    // The wake releases the port so the real server can claim it.
    wait_for_released(mc_port).await;

    // The machine boots; the proxy goes ONLINE and stays inert.
    host.set_up(true);
    sleep(Duration::from_secs(2)).await;
    assert!(TcpStream::connect(("127.0.0.1", mc_port)).await.is_err());

    // Next outage: the proxy takes over again, with the MOTD back to idle.
    host.set_up(false);
    let mut stream = wait_for_listener(mc_port).await;
    let status = query_status(&mut stream, 340).await;
    assert_eq!(status["version"]["protocol"], 340);
    assert_eq!(status["description"]["text"], "Join to start Server");
    drop(stream);

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(10), run_handle).await.unwrap();
    assert!(result.unwrap().is_ok());

    println!("✅ Full wake cycle integration test passed");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_presence_datagram_triggers_wake() {
    let mc_port = free_tcp_port();
    let udp_port = free_udp_port();
    let host = ScriptedHost::new();
    let orchestrator = Orchestrator::new(test_config(mc_port, vec![udp_port]), host.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_handle = tokio::spawn(orchestrator.run(shutdown_rx));

    // Proxy comes up after the failure streak.
    let stream = wait_for_listener(mc_port).await;
    drop(stream);

    // Any datagram on a presence port is a discovery probe.
    let prober = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    prober.send_to(b"server browser query", ("127.0.0.1", udp_port)).await.unwrap();

    // The wake releases both listeners.
    wait_for_released(mc_port).await;
    let rebound = std::net::UdpSocket::bind(("127.0.0.1", udp_port));
    assert!(rebound.is_ok(), "presence port still bound after wake");

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(10), run_handle).await.unwrap();
    assert!(result.unwrap().is_ok());

    println!("✅ Presence wake integration test passed");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_online_proxy_is_inert() {
    let mc_port = free_tcp_port();
    let host = ScriptedHost::new();
    host.set_up(true);
    let orchestrator = Orchestrator::new(test_config(mc_port, vec![]), host.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_handle = tokio::spawn(orchestrator.run(shutdown_rx));

    // While the real server is reachable nothing may be bound.
    sleep(Duration::from_secs(3)).await;
    assert!(TcpStream::connect(("127.0.0.1", mc_port)).await.is_err());

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(10), run_handle).await.unwrap();
    assert!(result.unwrap().is_ok());

    println!("✅ Inert-while-online integration test passed");
}
