//! Lifecycle files read by out-of-band probes.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use pokerd_shared::PlayerId;

/// Sentinel file whose contents transition RUNNING -> DONE over the session
/// lifetime.
#[derive(Clone, Debug)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatusFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mark_running(&self) -> Result<()> {
        self.write("RUNNING")
    }

    pub fn mark_done(&self) -> Result<()> {
        self.write("DONE")
    }

    fn write(&self, state: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating status directory '{}'", parent.display())
                })?;
            }
        }
        fs::write(&self.path, format!("{state}\n"))
            .with_context(|| format!("writing status file '{}'", self.path.display()))
    }
}

/// Append-only per-session result log, one line per completed hand.
#[derive(Clone, Debug)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResultLog { path: path.into() }
    }

    pub fn append(&self, hand_no: u64, scores: &BTreeMap<PlayerId, i64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating result-log directory '{}'", parent.display())
                })?;
            }
        }
        let mut line = format!("GAME_{hand_no} {{");
        for (i, (player, score)) in scores.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            let _ = write!(line, "{player}: {score}");
        }
        line.push('}');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening result log '{}'", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("appending to result log '{}'", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_running_to_done() {
        let dir = tempfile::tempdir().unwrap();
        let status = StatusFile::new(dir.path().join("probe").join("status"));
        status.mark_running().unwrap();
        assert_eq!(fs::read_to_string(status.path()).unwrap(), "RUNNING\n");
        status.mark_done().unwrap();
        assert_eq!(fs::read_to_string(status.path()).unwrap(), "DONE\n");
    }

    #[test]
    fn result_log_appends_one_line_per_hand() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::new(dir.path().join("game_result.log"));
        let scores = BTreeMap::from([(PlayerId(1), -5i64), (PlayerId(2), 5i64)]);
        log.append(1, &scores).unwrap();
        log.append(2, &scores).unwrap();
        let text = fs::read_to_string(dir.path().join("game_result.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "GAME_1 {1: -5, 2: 5}");
        assert_eq!(lines[1], "GAME_2 {1: -5, 2: 5}");
    }
}
