//! Client-server messaging protocol.
//!
//! Every wire record is one JSON line shaped `{"type": <int>, "message":
//! <payload>}`. The typed views live here; framing lives in [`crate::codec`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::game::Pot;
use crate::player::PlayerId;

/// Numeric message codes used in the frame envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Connect = 0,
    Disconnect = 1,
    GameStart = 2,
    RoundStart = 3,
    RequestAction = 4,
    PlayerAction = 5,
    RoundEnd = 6,
    GameEnd = 7,
    Text = 8,
    GameState = 9,
}

impl MessageType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<MessageType> {
        match code {
            0 => Some(MessageType::Connect),
            1 => Some(MessageType::Disconnect),
            2 => Some(MessageType::GameStart),
            3 => Some(MessageType::RoundStart),
            4 => Some(MessageType::RequestAction),
            5 => Some(MessageType::PlayerAction),
            6 => Some(MessageType::RoundEnd),
            7 => Some(MessageType::GameEnd),
            8 => Some(MessageType::Text),
            9 => Some(MessageType::GameState),
            _ => None,
        }
    }
}

/// GameStart payload: the per-player view of a freshly started hand.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GameStartMsg {
    pub message: String,
    /// The recipient's two hole cards as wire tags.
    pub hands: Vec<String>,
    pub blind_amount: u32,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
}

/// RequestAction payload: solicits exactly the named player.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestActionMsg {
    pub player_id: PlayerId,
    /// Seconds the player has to answer before the server folds for them.
    pub time_left: u64,
}

/// PlayerAction payload: action is the integer code (Fold=1, Check=2,
/// Call=3, Raise=4, AllIn=5), amount the chips for Raise/AllIn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayerActionMsg {
    pub player_id: PlayerId,
    pub action: u8,
    pub amount: u32,
}

/// GameState payload: the public view broadcast after every applied action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GameStateMsg {
    pub round_num: usize,
    pub round: String,
    pub community_cards: Vec<String>,
    /// Total of the current round's contributions.
    pub pot: u32,
    /// Players still owing an action this round.
    pub current_player: BTreeSet<PlayerId>,
    pub current_bet: u32,
    pub player_bets: BTreeMap<PlayerId, u32>,
    /// Last action name per player who has acted this round.
    pub player_actions: BTreeMap<PlayerId, String>,
    /// Advisory only; not enforced beyond raise legality.
    pub min_raise: u32,
    pub max_raise: u32,
    pub side_pots: Vec<Pot>,
}

/// A typed protocol message, either direction.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Connect { player_id: PlayerId },
    Disconnect { reason: String },
    GameStart(GameStartMsg),
    RoundStart { round: String },
    RequestAction(RequestActionMsg),
    PlayerAction(PlayerActionMsg),
    RoundEnd { round: String },
    GameEnd { score: i64 },
    Text(String),
    GameState(Box<GameStateMsg>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Connect { .. } => MessageType::Connect,
            Message::Disconnect { .. } => MessageType::Disconnect,
            Message::GameStart(_) => MessageType::GameStart,
            Message::RoundStart { .. } => MessageType::RoundStart,
            Message::RequestAction(_) => MessageType::RequestAction,
            Message::PlayerAction(_) => MessageType::PlayerAction,
            Message::RoundEnd { .. } => MessageType::RoundEnd,
            Message::GameEnd { .. } => MessageType::GameEnd,
            Message::Text(_) => MessageType::Text,
            Message::GameState(_) => MessageType::GameState,
        }
    }

    pub fn text(s: impl Into<String>) -> Message {
        Message::Text(s.into())
    }
}
