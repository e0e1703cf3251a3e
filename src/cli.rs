use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Server CLI for pokerd
#[derive(Parser, Debug, Clone)]
#[command(name = "pokerd", version, about = "Authoritative hold'em dealer for remote agents")]
pub struct ServerCli {
    /// Path to config file
    #[arg(long, default_value = "pokerd.toml")]
    pub config: PathBuf,

    /// Listen port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Connections required before play starts (overrides config)
    #[arg(long)]
    pub players: Option<usize>,

    /// Stop after this many hands (overrides config)
    #[arg(long)]
    pub hands: Option<u64>,

    /// Big-blind size in chips (overrides config)
    #[arg(long)]
    pub blind: Option<u32>,

    /// Per-turn timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seed deck shuffles for a reproducible session (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Persist CLI overrides back to the config file
    #[arg(long, default_value_t = false)]
    pub persist: bool,

    /// Enable verbose debug logging
    #[arg(long, short, default_value_t = false)]
    pub debug: bool,
}

impl ServerCli {
    /// Apply the in-memory overrides (non-persistent unless `--persist`).
    pub fn apply_to(&self, cfg: &mut Config) {
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(players) = self.players {
            cfg.players = players;
        }
        if let Some(hands) = self.hands {
            cfg.hands = Some(hands);
        }
        if let Some(blind) = self.blind {
            cfg.blind = blind;
        }
        if let Some(timeout) = self.timeout {
            cfg.turn_timeout_secs = timeout;
        }
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
    }
}
