//! Error types for the proxy core.
//!
//! One enum covers the whole crate; variants map onto the failure classes
//! the daemon distinguishes operationally (retry, downgrade, abort the
//! connection, keep running).

use thiserror::Error;

/// Errors that can occur while running the wake-on-demand proxy.
///
/// None of these are fatal to the daemon itself. Detection and claim
/// failures are retried by the control loop, protocol violations abort only
/// the offending connection, and everything else is logged and survived.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The route or interface owning the target address could not be found
    #[error("Address detection failed: {0}")]
    Detection(String),

    /// Adding the secondary address to the interface failed
    #[error("Address claim failed: {0}")]
    Claim(String),

    /// The configured hardware address is not 6 colon-separated hex octets
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// A client sent bytes that violate the wire protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A listener socket could not be bound or started
    #[error("Listener error: {0}")]
    Listener(String),

    /// Invalid internal state or setup failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Underlying I/O failure (socket reads/writes, process spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
