//! Command-line argument parsing
//!
//! This module defines the command-line interface for the wake-on-demand
//! proxy daemon using the clap crate for argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the wake-on-demand proxy daemon
///
/// These arguments allow users to override configuration file settings
/// and control daemon behavior from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about = "Wake-on-demand proxy for dormant game servers", long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// Specifies the path to the TOML configuration file.
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    ///
    /// When enabled, sets the logging level to debug, providing more
    /// detailed output for troubleshooting.
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            debug: false,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::default();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(!args.debug);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from(["wol-proxy", "--config", "/etc/wol-proxy.toml", "--debug"]);
        assert_eq!(args.config, PathBuf::from("/etc/wol-proxy.toml"));
        assert!(args.debug);
        assert!(!args.json_logs);
    }
}
