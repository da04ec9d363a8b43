//! Protocol listeners sharing the claimed address.
//!
//! Both listeners report client activity as [`WakeEvent`]s into the
//! orchestrator's channel and never touch lifecycle state themselves.
//!
//! [`WakeEvent`]: crate::orchestrator::WakeEvent

pub mod minecraft;
pub mod presence;
pub mod varint;

pub use minecraft::{MinecraftListener, StatusProvider};
pub use presence::PresenceListener;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a running listener.
///
/// Owned by the orchestrator; at most one live handle exists per protocol.
/// Dropping the handle without calling [`stop`](Self::stop) leaves the
/// tasks running, so the orchestrator always stops explicitly.
pub struct ListenerHandle {
    name: &'static str,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown: broadcast::Sender<()>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            name,
            shutdown,
            tasks,
        }
    }

    /// Stops the listener and waits until its sockets are unbound.
    ///
    /// Awaiting every task before returning guarantees a subsequent bind
    /// on the same address cannot race a socket still in a closing state.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = join_all(self.tasks).await;
        debug!("{} listener stopped", self.name);
    }
}
