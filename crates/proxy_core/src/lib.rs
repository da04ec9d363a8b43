//! # Wake-on-Demand Proxy Core
//!
//! Library backing the `wol-proxy` daemon: it impersonates a dormant game
//! server on the network, notices a client trying to connect, wakes the real
//! machine via Wake-on-LAN, and steps aside once the real server answers.
//!
//! ## Architecture Overview
//!
//! * **Orchestrator** - liveness-driven state machine owning the lifecycle
//!   (INIT → OFFLINE → STARTING → ONLINE) and the claimed address
//! * **IP Ownership** - detects the route to the target, claims the address
//!   as a secondary on the owning interface, announces it via gratuitous ARP
//! * **Minecraft Listener** - handshake/status/login subset of the server
//!   list ping protocol, enough to answer status queries and catch joins
//! * **Presence Listener** - silent UDP sinks that treat any inbound
//!   datagram as a discovery probe
//! * **Wake Trigger** - magic packets fanned out over every known broadcast
//!   domain
//!
//! ## Event Flow
//!
//! Listeners never touch lifecycle state directly. They emit
//! [`WakeEvent`]s into a channel the orchestrator drains serially, so state
//! transitions stay single-writer: a wake arriving mid-transition queues and
//! is processed after the in-flight transition completes.
//!
//! ## Error Handling
//!
//! All failures are modelled by [`ProxyError`]. The daemon is designed to
//! run indefinitely: protocol violations abort only the offending
//! connection, claim and detection failures are retried on the next poll,
//! and release failures that mean "already gone" are downgraded to warnings.

pub use command::{probe_host, CommandExecutor, CommandOutput, SystemCommandExecutor};
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use orchestrator::{LifecycleState, Orchestrator, WakeEvent};
pub use protocol::{ListenerHandle, MinecraftListener, PresenceListener, StatusProvider};

pub mod command;
pub mod config;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod net;
pub mod orchestrator;
pub mod protocol;
