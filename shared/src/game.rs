//! Actions, betting rounds and pot views.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::player::PlayerId;

/// One betting round of a hand, in fixed ordinal order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Round {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Round {
    pub const ALL: [Round; 4] = [Round::Preflop, Round::Flop, Round::Turn, Round::River];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Round> {
        Round::ALL.get(index).copied()
    }

    /// The textual round name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Round::Preflop => "Preflop",
            Round::Flop => "Flop",
            Round::Turn => "Turn",
            Round::River => "River",
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A betting action. Amounts are chips added to the player's contribution
/// this round; Call carries no amount (the owed difference is implied).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise(u32),
    AllIn(u32),
}

impl Action {
    /// The integer action code used in PlayerAction wire messages.
    pub fn code(self) -> u8 {
        match self {
            Action::Fold => 1,
            Action::Check => 2,
            Action::Call => 3,
            Action::Raise(_) => 4,
            Action::AllIn(_) => 5,
        }
    }

    /// Decode a wire (code, amount) pair; None for unknown codes.
    pub fn from_wire(code: u8, amount: u32) -> Option<Action> {
        match code {
            1 => Some(Action::Fold),
            2 => Some(Action::Check),
            3 => Some(Action::Call),
            4 => Some(Action::Raise(amount)),
            5 => Some(Action::AllIn(amount)),
            _ => None,
        }
    }

    /// The amount carried by the action (0 for Fold/Check/Call).
    pub fn amount(self) -> u32 {
        match self {
            Action::Raise(a) | Action::AllIn(a) => a,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Raise(_) => "raise",
            Action::AllIn(_) => "all_in",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Raise(a) => write!(f, "raise {a}"),
            Action::AllIn(a) => write!(f, "all_in {a}"),
            other => f.write_str(other.name()),
        }
    }
}

/// A pot (main or side) with the players who can win it. Index 0 in a pot
/// list is the main pot; higher indices are side pots created by all-ins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pot {
    pub amount: u32,
    pub eligible_players: BTreeSet<PlayerId>,
}

impl Pot {
    pub fn new(amount: u32, eligible_players: BTreeSet<PlayerId>) -> Self {
        Pot {
            amount,
            eligible_players,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_round_trip() {
        let actions = [
            Action::Fold,
            Action::Check,
            Action::Call,
            Action::Raise(40),
            Action::AllIn(115),
        ];
        for a in actions {
            assert_eq!(Action::from_wire(a.code(), a.amount()), Some(a));
        }
        assert_eq!(Action::from_wire(0, 0), None);
        assert_eq!(Action::from_wire(6, 10), None);
    }

    #[test]
    fn round_order_and_names() {
        assert!(Round::Preflop < Round::River);
        assert_eq!(Round::from_index(2), Some(Round::Turn));
        assert_eq!(Round::from_index(4), None);
        assert_eq!(Round::Flop.name(), "Flop");
    }
}
