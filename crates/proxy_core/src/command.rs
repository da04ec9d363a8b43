//! Command executor boundary.
//!
//! The core drives OS networking (route lookup, address add/remove, ARP
//! announce, reachability probe) through one narrow seam: run an argv,
//! get back exit status and captured output. Tests substitute a scripted
//! implementation; production uses [`SystemCommandExecutor`].

use crate::error::ProxyError;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Captured result of one executed command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Captured standard output, lossily decoded
    pub stdout: String,
    /// Captured standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Convenience constructor for a successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Convenience constructor for a failed run with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Opaque capability to run OS network commands.
///
/// Implementations must be safe to share across the orchestrator and its
/// listeners; the core only ever awaits one invocation at a time per
/// concern, so no internal queueing is required.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `argv` to completion and capture its output.
    ///
    /// A non-zero exit status is not an `Err`; it is reported through
    /// [`CommandOutput::success`]. `Err` is reserved for failures to run
    /// the command at all (missing binary, spawn failure).
    async fn run(&self, argv: &[&str]) -> Result<CommandOutput, ProxyError>;
}

/// Production executor backed by real child processes.
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, argv: &[&str]) -> Result<CommandOutput, ProxyError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProxyError::Internal("empty command line".to_string()))?;

        trace!("Running command: {}", argv.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Probe whether `host` answers an ICMP echo within `timeout_secs`.
///
/// Uses the system `ping` binary (typically setuid) so the daemon does not
/// need raw-socket privileges of its own. Any failure to run the probe is
/// treated as "not reachable".
pub async fn probe_host(executor: &dyn CommandExecutor, host: Ipv4Addr, timeout_secs: u64) -> bool {
    let timeout = timeout_secs.max(1).to_string();
    let host = host.to_string();
    match executor.run(&["ping", "-c", "1", "-w", &timeout, &host]).await {
        Ok(output) => output.success,
        Err(e) => {
            debug!("Reachability probe for {} failed to run: {}", host, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedExecutor {
        output: CommandOutput,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CommandExecutor for FixedExecutor {
        async fn run(&self, argv: &[&str]) -> Result<CommandOutput, ProxyError> {
            self.calls
                .lock()
                .unwrap()
                .push(argv.iter().map(|s| s.to_string()).collect());
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_probe_reports_success() {
        let executor = FixedExecutor {
            output: CommandOutput::ok(""),
            calls: Mutex::new(Vec::new()),
        };
        assert!(probe_host(&executor, Ipv4Addr::new(10, 0, 0, 50), 3).await);

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "ping");
        assert!(calls[0].contains(&"10.0.0.50".to_string()));
    }

    #[tokio::test]
    async fn test_probe_reports_failure() {
        let executor = FixedExecutor {
            output: CommandOutput::failed("Destination Host Unreachable"),
            calls: Mutex::new(Vec::new()),
        };
        assert!(!probe_host(&executor, Ipv4Addr::new(10, 0, 0, 50), 3).await);
    }

    #[tokio::test]
    async fn test_probe_timeout_clamped_to_one_second() {
        let executor = FixedExecutor {
            output: CommandOutput::ok(""),
            calls: Mutex::new(Vec::new()),
        };
        probe_host(&executor, Ipv4Addr::new(10, 0, 0, 50), 0).await;

        let calls = executor.calls.lock().unwrap();
        let timeout_pos = calls[0].iter().position(|a| a == "-w").unwrap();
        assert_eq!(calls[0][timeout_pos + 1], "1");
    }

    #[tokio::test]
    async fn test_system_executor_rejects_empty_argv() {
        let result = SystemCommandExecutor.run(&[]).await;
        assert!(matches!(result, Err(ProxyError::Internal(_))));
    }

    #[tokio::test]
    async fn test_system_executor_captures_exit_status() {
        // `false` is POSIX-guaranteed to exit non-zero.
        let output = SystemCommandExecutor.run(&["false"]).await.unwrap();
        assert!(!output.success);
    }
}
