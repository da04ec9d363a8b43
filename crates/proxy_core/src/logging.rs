//! Logging system setup and configuration
//!
//! This module handles the initialization of the tracing-based logging
//! system used throughout the daemon for diagnostics and operability.

use crate::error::ProxyError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system
///
/// Sets up structured logging using the tracing crate. The filter respects
/// the `RUST_LOG` environment variable, falling back to the configured
/// level otherwise.
///
/// # Arguments
/// * `level` - Base logging level (e.g. "info", "debug")
/// * `json_format` - Whether to emit structured JSON lines instead of
///   human-readable output
///
/// # Returns
/// * `Result<(), ProxyError>` - Fails only if a global subscriber was
///   already installed
pub fn setup_logging(level: &str, json_format: bool) -> Result<(), ProxyError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json_format {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    result.map_err(|e| ProxyError::Internal(format!("Logging init failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_setup_is_single_shot() {
        // The first initialization in the process wins; any later one must
        // surface as an error rather than a panic.
        let first = setup_logging("info", false);
        let second = setup_logging("debug", true);
        assert!(first.is_ok() || second.is_err());
    }
}
