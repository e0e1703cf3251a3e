//! Card types and the two-character card tags used on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Card rank values (0=Ace, 1=2, ..., 12=King)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardRank {
    Ace = 0,
    Two = 1,
    Three = 2,
    Four = 3,
    Five = 4,
    Six = 5,
    Seven = 6,
    Eight = 7,
    Nine = 8,
    Ten = 9,
    Jack = 10,
    Queen = 11,
    King = 12,
}

impl CardRank {
    /// Convert from u8 to CardRank. Panics if value > 12.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CardRank::Ace,
            1 => CardRank::Two,
            2 => CardRank::Three,
            3 => CardRank::Four,
            4 => CardRank::Five,
            5 => CardRank::Six,
            6 => CardRank::Seven,
            7 => CardRank::Eight,
            8 => CardRank::Nine,
            9 => CardRank::Ten,
            10 => CardRank::Jack,
            11 => CardRank::Queen,
            12 => CardRank::King,
            _ => panic!("Invalid card rank: {}", value),
        }
    }
}

/// Card suit values (0=Clubs, 1=Diamonds, 2=Hearts, 3=Spades)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardSuit {
    Clubs = 0,
    Diamonds = 1,
    Hearts = 2,
    Spades = 3,
}

impl CardSuit {
    /// Convert from u8 to CardSuit. Panics if value > 3.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CardSuit::Clubs,
            1 => CardSuit::Diamonds,
            2 => CardSuit::Hearts,
            3 => CardSuit::Spades,
            _ => panic!("Invalid card suit: {}", value),
        }
    }
}

/// A playing card represented as a compact u8 value
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Card(pub u8);

impl Card {
    /// Create a new card from rank and suit
    pub fn new(rank: CardRank, suit: CardSuit) -> Self {
        Card((suit as u8) * 13 + (rank as u8))
    }

    /// Get the rank of this card
    pub fn rank(self) -> CardRank {
        CardRank::from_u8(self.0 % 13)
    }

    /// Get the suit of this card
    pub fn suit(self) -> CardSuit {
        CardSuit::from_u8(self.0 / 13)
    }

    /// Get the rank as a character (A, 2, ..., T, J, Q, K)
    pub fn rank_char(self) -> char {
        match self.rank() {
            CardRank::Ace => 'A',
            CardRank::Two => '2',
            CardRank::Three => '3',
            CardRank::Four => '4',
            CardRank::Five => '5',
            CardRank::Six => '6',
            CardRank::Seven => '7',
            CardRank::Eight => '8',
            CardRank::Nine => '9',
            CardRank::Ten => 'T',
            CardRank::Jack => 'J',
            CardRank::Queen => 'Q',
            CardRank::King => 'K',
        }
    }

    /// Get the suit as a lowercase character (c, d, h, s)
    pub fn suit_char(self) -> char {
        match self.suit() {
            CardSuit::Clubs => 'c',
            CardSuit::Diamonds => 'd',
            CardSuit::Hearts => 'h',
            CardSuit::Spades => 's',
        }
    }

    /// The two-character wire tag, e.g. "As", "Td", "9h".
    pub fn tag(self) -> String {
        format!("{}{}", self.rank_char(), self.suit_char())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_char(), self.suit_char())
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(r), Some(su), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("card tag must be two characters: '{s}'"));
        };
        let rank = match r.to_ascii_uppercase() {
            'A' => CardRank::Ace,
            '2' => CardRank::Two,
            '3' => CardRank::Three,
            '4' => CardRank::Four,
            '5' => CardRank::Five,
            '6' => CardRank::Six,
            '7' => CardRank::Seven,
            '8' => CardRank::Eight,
            '9' => CardRank::Nine,
            'T' => CardRank::Ten,
            'J' => CardRank::Jack,
            'Q' => CardRank::Queen,
            'K' => CardRank::King,
            _ => return Err(format!("unknown rank '{r}' in card tag '{s}'")),
        };
        let suit = match su.to_ascii_lowercase() {
            'c' => CardSuit::Clubs,
            'd' => CardSuit::Diamonds,
            'h' => CardSuit::Hearts,
            's' => CardSuit::Spades,
            _ => return Err(format!("unknown suit '{su}' in card tag '{s}'")),
        };
        Ok(Card::new(rank, suit))
    }
}
