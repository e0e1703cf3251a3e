use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration persisted as TOML.
///
/// Fields:
/// - host/port: where the listener binds (port 0 picks a free port)
/// - players: connections required before play starts
/// - turn_timeout_secs: how long a solicited player may think
/// - blind: big-blind size in chips (small blind is half)
/// - hands: optional hand budget; None plays until quorum is lost
/// - hand_delay_ms: pause between hands in continuous play
/// - post_blinds: post blinds server-side instead of having clients
///   volunteer them on their first turn
/// - initial_chips: per-player bankroll at session start
/// - output_dir: where per-hand JSON logs land
/// - status_file / results_file: optional lifecycle sentinel and per-hand
///   result lines
/// - seed: optional deck-shuffle seed for reproducible sessions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub players: usize,
    pub turn_timeout_secs: u64,
    pub blind: u32,
    pub hands: Option<u64>,
    pub hand_delay_ms: u64,
    pub post_blinds: bool,
    pub initial_chips: i64,
    pub output_dir: PathBuf,
    pub status_file: Option<PathBuf>,
    pub results_file: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 5000,
            players: 2,
            turn_timeout_secs: 30,
            blind: 10,
            hands: None,
            hand_delay_ms: 500,
            post_blinds: false,
            initial_chips: 1000,
            output_dir: PathBuf::from("output"),
            status_file: Some(PathBuf::from("output/session_status")),
            results_file: Some(PathBuf::from("output/game_result.log")),
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`. If the file does not exist, create it
    /// with defaults and return those.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)
                .with_context(|| format!("reading config file '{}'", path.display()))?;
            let cfg: Config = toml::from_str(&s)
                .with_context(|| format!("parsing TOML config '{}'", path.display()))?;
            Ok(cfg)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("creating config directory '{}'", parent.display())
                    })?;
                }
            }
            let cfg = Config::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Save the current config back to `path` (overwrites).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating config directory '{}'", parent.display()))?;
            }
        }
        let toml_text =
            toml::to_string_pretty(self).with_context(|| "serializing config to TOML")?;
        fs::write(path, toml_text)
            .with_context(|| format!("writing config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn hand_delay(&self) -> Duration {
        Duration::from_millis(self.hand_delay_ms)
    }
}
