//! CLI argument definitions for logship-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logship syslog filtering and forwarding daemon.
///
/// Listens for syslog messages on UDP and TCP, classifies each message
/// against user-defined rules, applies the byte-volume threshold policy,
/// and forwards or drops the message, recording the outcome.
#[derive(Parser, Debug)]
#[command(name = "logship-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logship.toml configuration file.
    #[arg(short, long, default_value = "/etc/logship/logship.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
