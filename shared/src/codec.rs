//! Framing for the newline-delimited JSON protocol.
//!
//! A frame is a single line `{"type": <int>, "message": <payload>}`. This
//! module only converts between [`Message`] values and frame text; socket
//! I/O stays with the caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::messages::{
    GameStartMsg, GameStateMsg, Message, MessageType, PlayerActionMsg, RequestActionMsg,
};
use crate::player::PlayerId;

#[derive(Serialize, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: u8,
    message: Value,
}

/// Serialize a message to one frame line (no trailing newline).
pub fn encode(msg: &Message) -> serde_json::Result<String> {
    let payload = match msg {
        Message::Connect { player_id } => json!(player_id),
        Message::Disconnect { reason } => json!(reason),
        Message::GameStart(m) => serde_json::to_value(m)?,
        Message::RoundStart { round } => json!(round),
        Message::RequestAction(m) => serde_json::to_value(m)?,
        Message::PlayerAction(m) => serde_json::to_value(m)?,
        Message::RoundEnd { round } => json!(round),
        Message::GameEnd { score } => json!(score),
        Message::Text(s) => json!(s),
        Message::GameState(m) => serde_json::to_value(m)?,
    };
    serde_json::to_string(&Frame {
        kind: msg.message_type().code(),
        message: payload,
    })
}

/// Parse one frame line. Returns `Ok(None)` for syntactically valid frames
/// with an unknown type code, which peers ignore with a warning.
pub fn decode(line: &str) -> serde_json::Result<Option<Message>> {
    let frame: Frame = serde_json::from_str(line)?;
    let Some(kind) = MessageType::from_code(frame.kind) else {
        return Ok(None);
    };
    let msg = match kind {
        MessageType::Connect => Message::Connect {
            player_id: serde_json::from_value::<PlayerId>(frame.message)?,
        },
        MessageType::Disconnect => Message::Disconnect {
            reason: serde_json::from_value(frame.message)?,
        },
        MessageType::GameStart => {
            Message::GameStart(serde_json::from_value::<GameStartMsg>(frame.message)?)
        }
        MessageType::RoundStart => Message::RoundStart {
            round: serde_json::from_value(frame.message)?,
        },
        MessageType::RequestAction => {
            Message::RequestAction(serde_json::from_value::<RequestActionMsg>(frame.message)?)
        }
        MessageType::PlayerAction => {
            Message::PlayerAction(serde_json::from_value::<PlayerActionMsg>(frame.message)?)
        }
        MessageType::RoundEnd => Message::RoundEnd {
            round: serde_json::from_value(frame.message)?,
        },
        MessageType::GameEnd => Message::GameEnd {
            score: serde_json::from_value(frame.message)?,
        },
        MessageType::Text => Message::Text(serde_json::from_value(frame.message)?),
        MessageType::GameState => Message::GameState(Box::new(serde_json::from_value::<
            GameStateMsg,
        >(frame.message)?)),
    };
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Pot;
    use std::collections::{BTreeMap, BTreeSet};

    fn round_trip(msg: Message) {
        let line = encode(&msg).unwrap();
        assert!(!line.contains('\n'));
        let back = decode(&line).unwrap().expect("known type");
        assert_eq!(back, msg);
    }

    #[test]
    fn all_message_types_round_trip() {
        round_trip(Message::Connect {
            player_id: PlayerId(2),
        });
        round_trip(Message::Disconnect {
            reason: "server shutting down".into(),
        });
        round_trip(Message::GameStart(GameStartMsg {
            message: "Hand #3 starting".into(),
            hands: vec!["As".into(), "Kd".into()],
            blind_amount: 10,
            is_small_blind: true,
            is_big_blind: false,
        }));
        round_trip(Message::RoundStart {
            round: "Preflop".into(),
        });
        round_trip(Message::RequestAction(RequestActionMsg {
            player_id: PlayerId(1),
            time_left: 30,
        }));
        round_trip(Message::PlayerAction(PlayerActionMsg {
            player_id: PlayerId(1),
            action: 4,
            amount: 50,
        }));
        round_trip(Message::RoundEnd {
            round: "River".into(),
        });
        round_trip(Message::GameEnd { score: -35 });
        round_trip(Message::Text("Invalid action. Try again.".into()));

        let mut bets = BTreeMap::new();
        bets.insert(PlayerId(1), 50);
        bets.insert(PlayerId(2), 100);
        let mut acted = BTreeMap::new();
        acted.insert(PlayerId(1), "all_in".to_string());
        round_trip(Message::GameState(Box::new(GameStateMsg {
            round_num: 1,
            round: "Flop".into(),
            community_cards: vec!["2h".into(), "3s".into(), "4d".into()],
            pot: 150,
            current_player: BTreeSet::from([PlayerId(2), PlayerId(3)]),
            current_bet: 100,
            player_bets: bets,
            player_actions: acted,
            min_raise: 100,
            max_raise: 200,
            side_pots: vec![Pot::new(150, BTreeSet::from([PlayerId(1), PlayerId(2)]))],
        })));
    }

    #[test]
    fn envelope_shape_is_stable() {
        let line = encode(&Message::Connect {
            player_id: PlayerId(7),
        })
        .unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], 0);
        assert_eq!(v["message"], 7);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let parsed = decode(r#"{"type": 42, "message": {"anything": true}}"#).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"type": "connect"}"#).is_err());
        // A known type with the wrong payload shape is also an error.
        assert!(decode(r#"{"type": 5, "message": {"player_id": 1}}"#).is_err());
    }
}
