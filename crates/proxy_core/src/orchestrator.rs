//! Lifecycle orchestration.
//!
//! The orchestrator owns the daemon's state machine and is the single
//! writer of lifecycle state. It polls the real server's reachability,
//! claims the target address and starts both listeners when the server
//! goes dark, reacts to wake events reported by the listeners, and hands
//! the address back the moment the real server answers again.
//!
//! INIT → ONLINE      first probe succeeds
//! INIT/ONLINE → OFFLINE   failure streak reaches the threshold
//! OFFLINE → STARTING wake event: send WOL, release early, flip MOTD
//! STARTING → ONLINE  probe succeeds once the machine has booted

use crate::command::{probe_host, CommandExecutor};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::liveness::LivenessTracker;
use crate::net::{wol, IpOwnership};
use crate::protocol::{ListenerHandle, MinecraftListener, PresenceListener, StatusProvider};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Wake events queue here until the control loop drains them; the bound
/// only matters if clients flood faster than the loop turns.
const WAKE_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle of the proxied address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Process start; reachability not yet established
    Init,
    /// Real server down; address claimed, listeners active
    Offline,
    /// Wake sent; address released so the booting server can claim it
    Starting,
    /// Real server reachable; the proxy is fully inert
    Online,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Offline => "OFFLINE",
            Self::Starting => "STARTING",
            Self::Online => "ONLINE",
        };
        f.write_str(name)
    }
}

/// A listener noticed client activity that warrants waking the server.
#[derive(Debug, Clone)]
pub struct WakeEvent {
    /// Diagnostic context: which listener, which peer
    pub reason: String,
}

/// The daemon's control loop and state owner.
///
/// Listeners communicate exclusively through the wake-event channel, so
/// every state transition is evaluated serially on this loop; claim and
/// release can therefore never run concurrently for the target address.
pub struct Orchestrator {
    config: ProxyConfig,
    executor: Arc<dyn CommandExecutor>,
    ownership: IpOwnership,
    status: Arc<StatusProvider>,
    state: LifecycleState,
    liveness: LivenessTracker,
    wake_tx: mpsc::Sender<WakeEvent>,
    wake_rx: mpsc::Receiver<WakeEvent>,
    minecraft: Option<ListenerHandle>,
    presence: Option<ListenerHandle>,
}

impl Orchestrator {
    /// Creates an orchestrator in the INIT state. Nothing is claimed or
    /// bound until the first failure streak completes.
    pub fn new(config: ProxyConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
        let status = Arc::new(StatusProvider::new(
            config.motd_idle.clone(),
            config.motd_starting.clone(),
            config.version_label.clone(),
        ));
        let ownership = IpOwnership::new(config.target_ip, config.prefix_len, executor.clone());
        let liveness = LivenessTracker::new(config.effective_threshold());

        Self {
            config,
            executor,
            ownership,
            status,
            state: LifecycleState::Init,
            liveness,
            wake_tx,
            wake_rx,
            minecraft: None,
            presence: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A sender into the wake-event channel, for composing additional
    /// trigger sources.
    pub fn wake_sender(&self) -> mpsc::Sender<WakeEvent> {
        self.wake_tx.clone()
    }

    /// Runs the control loop until `shutdown` fires.
    ///
    /// The loop itself never exits on error; operational failures are
    /// logged and retried on the next poll. On shutdown the listeners are
    /// stopped and the address is released before returning.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<(), ProxyError> {
        info!(
            "Orchestrator watching {} (probe every {}s, threshold {})",
            self.config.target_ip,
            self.config.probe_interval_secs.max(1),
            self.config.effective_threshold()
        );

        let mut poll = interval(Duration::from_secs(self.config.probe_interval_secs.max(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => self.poll_liveness().await,
                Some(event) = self.wake_rx.recv() => self.handle_wake(event).await,
                _ = &mut shutdown => {
                    info!("Shutdown requested, releasing claimed resources");
                    self.ensure_released().await;
                    return Ok(());
                }
            }
        }
    }

    /// One reachability probe plus whatever transition it implies.
    async fn poll_liveness(&mut self) {
        let up = probe_host(
            self.executor.as_ref(),
            self.config.target_ip,
            self.config.probe_timeout_secs(),
        )
        .await;

        if up {
            self.liveness.record_success();
            self.ensure_released().await;
            if self.state != LifecycleState::Online {
                self.status.set_starting(false);
                self.transition(LifecycleState::Online, "real server reachable");
            }
            return;
        }

        if !self.liveness.record_failure() {
            debug!(
                "Probe failed ({} consecutive, threshold {})",
                self.liveness.failures(),
                self.config.effective_threshold()
            );
            return;
        }

        if self.state == LifecycleState::Starting {
            // Wake already in flight; keep waiting for the machine to boot.
            return;
        }

        match self.ensure_claimed_and_listening().await {
            Ok(()) => {
                if self.state != LifecycleState::Offline {
                    self.transition(LifecycleState::Offline, "proxy active, awaiting clients");
                }
            }
            Err(e) => warn!("Takeover attempt failed, retrying next poll: {}", e),
        }
    }

    /// Reacts to a listener-reported wake event.
    async fn handle_wake(&mut self, event: WakeEvent) {
        match self.state {
            LifecycleState::Offline => self.trigger_wake(&event.reason).await,
            LifecycleState::Starting => {
                debug!("Wake already in flight, suppressing: {}", event.reason);
            }
            _ => debug!("Stale wake event in state {}: {}", self.state, event.reason),
        }
    }

    /// Sends the magic packets and steps out of the real server's way.
    async fn trigger_wake(&mut self, reason: &str) {
        info!("Wake trigger: {}", reason);

        let mut broadcasts = match self.ownership.broadcast_addresses().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to determine broadcast addresses: {}", e);
                Vec::new()
            }
        };
        broadcasts.push(Ipv4Addr::BROADCAST);

        if let Err(e) = wol::wake(&self.config.target_mac, &broadcasts).await {
            error!("Wake-on-LAN failed: {}", e);
        }

        self.status.set_starting(true);
        self.transition(LifecycleState::Starting, reason);

        // Free the address and ports right away so the waking server can
        // bind them as it boots.
        self.ensure_released().await;
    }

    /// Claims the address and starts any listener that is not running.
    ///
    /// Starting a listener that already has a live handle is a no-op, so
    /// this is safe to call on every poll while OFFLINE.
    async fn ensure_claimed_and_listening(&mut self) -> Result<(), ProxyError> {
        self.ownership.claim().await?;

        if self.minecraft.is_none() {
            let bind_addr =
                SocketAddr::new(IpAddr::V4(self.config.target_ip), self.config.minecraft_port);
            let handle =
                MinecraftListener::start(bind_addr, self.status.clone(), self.wake_tx.clone())
                    .await?;
            self.minecraft = Some(handle);
        }

        if self.presence.is_none() && !self.config.presence_ports.is_empty() {
            let handle = PresenceListener::start(
                IpAddr::V4(self.config.target_ip),
                &self.config.presence_ports,
                self.wake_tx.clone(),
            )
            .await?;
            self.presence = Some(handle);
        }

        Ok(())
    }

    /// Stops both listeners and releases the address; idempotent.
    ///
    /// Listeners are stopped first so their sockets are unbound before the
    /// address disappears from the interface.
    async fn ensure_released(&mut self) {
        if let Some(handle) = self.minecraft.take() {
            handle.stop().await;
        }
        if let Some(handle) = self.presence.take() {
            handle.stop().await;
        }
        self.ownership.release().await;
    }

    fn transition(&mut self, next: LifecycleState, reason: &str) {
        info!("State {} -> {} ({})", self.state, next, reason);
        self.state = next;
    }
}
