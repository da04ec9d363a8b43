//! Main application entry point for the wake-on-demand proxy daemon.
//!
//! Provides CLI interface, configuration loading, and orchestrator
//! startup with signal-driven graceful shutdown.

mod cli;
mod config;
mod signals;

use anyhow::Result;
use clap::Parser;
use cli::Args;
use config::AppConfig;
use proxy_core::{logging, Orchestrator, SystemCommandExecutor};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first, apply CLI overrides, then bring up logging.
    let mut app_config = AppConfig::load_from_file(&args.config).await?;
    if args.debug {
        app_config.logging.level = "debug".to_string();
    }
    if args.json_logs {
        app_config.logging.json_format = true;
    }

    if let Err(e) = app_config.validate() {
        anyhow::bail!("Configuration validation failed: {e}");
    }

    logging::setup_logging(&app_config.logging.level, app_config.logging.json_format)?;

    display_banner();
    info!("📂 Config: {}", args.config.display());
    info!(
        "🎯 Target: {} ({})",
        app_config.server.target_ip, app_config.server.target_mac
    );
    info!(
        "🌐 Minecraft port: {} | presence ports: {:?}",
        app_config.minecraft.port, app_config.presence.ports
    );
    info!(
        "⏱️ Probe interval: {}s | failure threshold: {}",
        app_config.probe.interval_secs, app_config.probe.fail_threshold
    );

    let proxy_config = app_config.to_proxy_config()?;
    let executor = Arc::new(SystemCommandExecutor);
    let orchestrator = Orchestrator::new(proxy_config, executor);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run_handle = tokio::spawn(orchestrator.run(shutdown_rx));

    info!("✅ Proxy is running; press Ctrl+C to shut down");
    signals::wait_for_signal().await?;

    info!("🛑 Shutdown signal received, stopping proxy");
    let _ = shutdown_tx.send(());

    match run_handle.await {
        Ok(Ok(())) => info!("✅ Proxy shut down cleanly"),
        Ok(Err(e)) => error!("❌ Proxy exited with error: {e}"),
        Err(e) => error!("❌ Proxy task failed: {e}"),
    }

    Ok(())
}

/// Display startup banner using proper logging
fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║           💤 WOL PROXY v{}            ║", version);
    info!("║                                          ║");
    info!("║  Wake-on-demand proxy for game servers   ║");
    info!("║  Claims the address, answers pings,      ║");
    info!("║  wakes the real machine on demand        ║");
    info!("╚══════════════════════════════════════════╝");
}
