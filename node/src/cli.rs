//! # CLI Interface
//!
//! Defines the command-line argument structure for `zdag-node` using
//! `clap` derive. Three subcommands: `run`, `replay` and `version`.
//! Policy flags are shared by `run` and `replay` and map one-to-one onto
//! [`ZdagConfig`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use zdag_protocol::config::{
    ZdagConfig, MAX_CHAIN_DEPTH, MAX_POOL_SIZE, MAX_STANDARD_TX_SIZE, ZDAG_MAX_DEPTH,
    ZDAG_MAX_TX_SIZE,
};

use crate::logging::LogFormat;

/// ZDAG double-spend detection engine.
///
/// Feeds transactions and block events into the engine and reports the
/// zero-confirmation status of pending transactions.
#[derive(Parser, Debug)]
#[command(
    name = "zdag-node",
    about = "Zero-confirmation double-spend detection engine",
    version,
    propagate_version = true
)]
pub struct ZdagNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read NDJSON commands from stdin and serve Prometheus metrics.
    Run(RunArgs),
    /// Execute a JSON scenario file and print one result per command.
    Replay(ReplayArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ZDAG_METRICS_PORT", default_value_t = 9742)]
    pub metrics_port: u16,

    /// Seconds between expiry sweeps. 0 disables the background sweep.
    #[arg(long, env = "ZDAG_EXPIRE_INTERVAL", default_value_t = 60)]
    pub expire_interval_secs: u64,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Arguments for the `replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Scenario file: a JSON array of commands.
    pub scenario: PathBuf,

    /// Print the Prometheus exposition after the last command.
    #[arg(long)]
    pub metrics: bool,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Pool and classification policy.
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Maximum number of pending transactions.
    #[arg(long, env = "ZDAG_MAX_POOL_SIZE", default_value_t = MAX_POOL_SIZE)]
    pub max_pool_size: usize,

    /// Serialized size above which admission is refused.
    #[arg(long, env = "ZDAG_MAX_TX_SIZE", default_value_t = MAX_STANDARD_TX_SIZE)]
    pub max_tx_size: usize,

    /// In-pool chain depth above which admission is refused.
    #[arg(long, env = "ZDAG_MAX_CHAIN_DEPTH", default_value_t = MAX_CHAIN_DEPTH)]
    pub max_chain_depth: usize,

    /// Serialized size above which a transaction is flagged over policy.
    #[arg(long, env = "ZDAG_POLICY_TX_SIZE", default_value_t = ZDAG_MAX_TX_SIZE)]
    pub zdag_max_tx_size: usize,

    /// In-pool chain depth above which a transaction is flagged over policy.
    #[arg(long, env = "ZDAG_POLICY_DEPTH", default_value_t = ZDAG_MAX_DEPTH)]
    pub zdag_max_depth: usize,

    /// Age in seconds after which pending transactions expire.
    #[arg(long, env = "ZDAG_EXPIRY_SECS", default_value_t = 14 * 24 * 60 * 60)]
    pub expiry_secs: u64,

    /// Initial relay broadcast delay in seconds, passed through to the
    /// relay layer.
    #[arg(long, env = "ZDAG_BROADCAST_DELAY_SECS", default_value_t = 15 * 60)]
    pub initial_broadcast_delay_secs: u64,
}

impl PolicyArgs {
    /// Builds the engine configuration.
    pub fn to_config(&self) -> ZdagConfig {
        ZdagConfig {
            max_pool_size: self.max_pool_size,
            max_tx_size: self.max_tx_size,
            max_chain_depth: self.max_chain_depth,
            zdag_max_tx_size: self.zdag_max_tx_size,
            zdag_max_depth: self.zdag_max_depth,
            expiry: Duration::from_secs(self.expiry_secs),
            initial_broadcast_delay: Duration::from_secs(self.initial_broadcast_delay_secs),
        }
    }
}

/// Logging flags.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log output format.
    #[arg(long, env = "ZDAG_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "zdag_node=info,zdag_protocol=info")]
    pub log_level: String,
}
