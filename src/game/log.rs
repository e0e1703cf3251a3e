//! Hand-log assembly and persistence.
//!
//! One JSON document per hand. Player ids inside the document are the
//! zero-based offsets of the wire ids, a presentation convention consumed by
//! downstream tooling.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use pokerd_shared::{Action, PlayerId, Pot};

use super::hand::Hand;
use super::round::IndexedPot;

fn log_id(player: PlayerId) -> usize {
    player.0.saturating_sub(1)
}

fn action_name(action: Action) -> String {
    action.name().to_uppercase()
}

fn pots_json(pots: &[Pot]) -> Value {
    Value::Array(
        pots.iter()
            .map(|p| {
                json!({
                    "amount": p.amount,
                    "eligible_players": p.eligible_players.iter().map(|&q| log_id(q)).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn indexed_pots_json(pots: &[IndexedPot]) -> Value {
    Value::Array(
        pots.iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "amount": p.amount,
                    "eligible_players": p.eligible_players.iter().map(|&q| log_id(q)).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

impl Hand {
    /// The persisted hand-log document (without the session's money block).
    pub fn hand_log(&self) -> Value {
        let player_names: Map<String, Value> = self
            .players
            .iter()
            .map(|&p| (log_id(p).to_string(), json!(format!("player{p}"))))
            .collect();
        let player_hands: Map<String, Value> = self
            .hole
            .iter()
            .map(|(&p, cards)| {
                (
                    log_id(p).to_string(),
                    json!(cards.iter().map(|c| c.tag()).collect::<Vec<_>>()),
                )
            })
            .collect();

        let mut rounds = Map::new();
        for (index, archive) in &self.archives {
            let bets: Map<String, Value> = archive
                .bets
                .iter()
                .map(|(&p, &bet)| (log_id(p).to_string(), json!(bet)))
                .collect();
            let actions: Map<String, Value> = archive
                .actions
                .iter()
                .map(|(&p, action)| {
                    let name = action
                        .map(action_name)
                        .unwrap_or_else(|| "NO_ACTION".to_string());
                    (log_id(p).to_string(), json!(name))
                })
                .collect();
            let action_times: Map<String, Value> = archive
                .action_times
                .iter()
                .map(|(&p, &t)| (log_id(p).to_string(), json!(t)))
                .collect();
            let action_sequence: Vec<Value> = archive
                .records
                .iter()
                .map(|r| {
                    json!({
                        "player": log_id(r.player),
                        "action": action_name(r.action),
                        "amount": r.amount,
                        "timestamp": r.timestamp_ms,
                        "pot_after_action": r.pot_after,
                        "side_pots_after_action": pots_json(&r.side_pots_after),
                        "total_pot_after_action": r.total_pot_after,
                        "total_side_pots_after_action": indexed_pots_json(&r.total_side_pots_after),
                    })
                })
                .collect();

            rounds.insert(
                index.to_string(),
                json!({
                    "pot": archive.pot,
                    "bets": bets,
                    "actions": actions,
                    "action_sequence": action_sequence,
                    "actionTimes": action_times,
                }),
            );
        }

        let (small, big) = self.blinds();
        json!({
            "gameId": self.hand_id,
            "playerNames": player_names,
            "playerHands": player_hands,
            "blinds": { "small": small, "big": big },
            "finalBoard": self.board.iter().map(|c| c.tag()).collect::<Vec<_>>(),
            "rounds": rounds,
            "sidePots": pots_json(&self.final_pots),
        })
    }

    pub fn hand_id(&self) -> &str {
        &self.hand_id
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }
}

/// Serialized writer for per-hand log files; one file per hand, named by
/// hand id plus the optional sequence number.
#[derive(Clone, Debug)]
pub struct HandLogWriter {
    dir: PathBuf,
}

impl HandLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating hand-log directory '{}'", dir.display()))?;
        Ok(HandLogWriter { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, log: &Value, hand_id: &str, sequence: Option<u64>) -> Result<PathBuf> {
        let filename = match sequence {
            Some(seq) => format!("hand_log_{seq}_{hand_id}.json"),
            None => format!("hand_log_{hand_id}.json"),
        };
        let path = self.dir.join(filename);
        let text = serde_json::to_string_pretty(log).context("serializing hand log")?;
        fs::write(&path, text)
            .with_context(|| format!("writing hand log '{}'", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poker::Deck;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn hand_log_uses_zero_based_ids() {
        let mut hand = Hand::new(10, Some(1));
        hand.add_player(PlayerId(1)).unwrap();
        hand.add_player(PlayerId(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        hand.start(Deck::shuffled(&mut rng)).unwrap();
        hand.apply(PlayerId(1), Action::Raise(20)).unwrap();
        hand.apply(PlayerId(2), Action::Call).unwrap();
        hand.end_round().unwrap();
        hand.end_hand().unwrap();

        let log = hand.hand_log();
        assert!(log["playerNames"].get("0").is_some());
        assert!(log["playerNames"].get("2").is_none());
        assert_eq!(log["blinds"]["small"], 5);
        assert_eq!(log["blinds"]["big"], 10);
        let round0 = &log["rounds"]["0"];
        assert_eq!(round0["pot"], 40);
        assert_eq!(round0["actions"]["0"], "RAISE");
        assert_eq!(round0["actions"]["1"], "CALL");
        let seq = round0["action_sequence"].as_array().unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0]["player"], 0);
        assert_eq!(seq[1]["amount"], 20);
    }

    #[test]
    fn writer_names_files_by_sequence_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let writer = HandLogWriter::new(dir.path().join("logs")).unwrap();
        let path = writer
            .write(&json!({"gameId": "abc"}), "abc", Some(7))
            .unwrap();
        assert!(path.ends_with("hand_log_7_abc.json"));
        assert!(path.exists());
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"gameId\""));
    }
}
