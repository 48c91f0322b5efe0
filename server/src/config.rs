//! Command line and environment configuration.

use crate::relay::RelayPolicy;
use clap::Parser;
use std::time::Duration;

/// Room and turn relay server for hex-board games
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on
    #[clap(short, long, env = "PORT", default_value = "4000")]
    pub port: u16,
    /// Maximum number of simultaneous websocket connections
    #[clap(short, long, default_value = "512")]
    pub max_connections: usize,
    /// Seconds without activity before a room is reclaimed, 0 to keep rooms forever
    #[clap(long, default_value = "3600")]
    pub idle_timeout_secs: u64,
    /// Seconds between idle room sweeps
    #[clap(long, default_value = "60")]
    pub sweep_interval_secs: u64,
    /// Reject room events from connections that are not players of that room
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub require_membership: bool,
    /// Only accept endTurn from the player whose turn it is
    #[clap(long)]
    pub enforce_turn_order: bool,
    /// Seed for room codes and board layouts
    #[clap(long)]
    pub seed: Option<u64>,
}

/// Runtime settings for [`Server`](crate::network::Server).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    /// `None` disables the idle sweep.
    pub idle_timeout: Option<Duration>,
    pub sweep_interval: Duration,
    pub policy: RelayPolicy,
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".to_string(),
            max_connections: 512,
            idle_timeout: Some(Duration::from_secs(3600)),
            sweep_interval: Duration::from_secs(60),
            policy: RelayPolicy::default(),
            seed: None,
        }
    }
}

impl Args {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_connections: self.max_connections,
            idle_timeout: match self.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            // tokio intervals panic on a zero period
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            policy: RelayPolicy {
                require_membership: self.require_membership,
                enforce_turn_order: self.enforce_turn_order,
            },
            seed: self.seed,
        }
    }
}
