//! Hand-strength evaluation.
//!
//! The betting engine only needs a total order over 5-7 card combinations,
//! so the evaluator is injected as a trait object; [`StandardEvaluator`] is
//! the real poker ordering and tests may substitute fixed orderings.

use serde::{Deserialize, Serialize};

use pokerd_shared::{Card, CardRank};

const NUM_SUITS: usize = 4;
// Rank values run 2..=14 (Ace high); index 1 doubles as the wheel Ace.
const VALUE_SLOTS: usize = 15;

/// Categories of poker hands, ordered from weakest to strongest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandRankCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeKind,
    Straight,
    Flush,
    FullHouse,
    FourKind,
    StraightFlush,
}

/// Complete hand ranking: category first, then tiebreakers compared
/// lexicographically. Derived ordering gives the poker total order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandRank {
    pub category: HandRankCategory,
    pub tiebreakers: Vec<u8>,
}

impl HandRank {
    pub fn new(category: HandRankCategory, tiebreakers: Vec<u8>) -> Self {
        HandRank {
            category,
            tiebreakers,
        }
    }
}

/// Totally orders any 5-7 card combination; a greater [`HandRank`] wins.
pub trait HandEvaluator: Send + Sync {
    fn rank(&self, cards: &[Card]) -> HandRank;
}

/// Standard no-limit hold'em hand ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardEvaluator;

impl HandEvaluator for StandardEvaluator {
    fn rank(&self, cards: &[Card]) -> HandRank {
        best_rank(cards)
    }
}

/// Evaluate the best 5-card hand available in `cards` (2 hole + up to 5
/// community in normal play; tolerates shorter slices for early folds).
pub fn best_rank(cards: &[Card]) -> HandRank {
    let flush_suit = flush_suit(cards);

    if let Some(fs) = flush_suit {
        let suited: Vec<u8> = cards
            .iter()
            .filter(|c| c.suit() as usize == fs)
            .map(|c| value_of(c.rank()))
            .collect();
        if let Some(high) = straight_high(&suited) {
            return HandRank::new(HandRankCategory::StraightFlush, vec![high]);
        }
    }

    let mut counts = [0u8; VALUE_SLOTS];
    let mut values: Vec<u8> = Vec::with_capacity(cards.len());
    for c in cards {
        let v = value_of(c.rank());
        counts[v as usize] += 1;
        values.push(v);
    }

    if let Some((quad, kicker)) = find_of_a_kind(&counts, 4) {
        return HandRank::new(HandRankCategory::FourKind, vec![quad, kicker]);
    }
    if let Some(rank) = find_full_house(&counts) {
        return rank;
    }
    if let Some(fs) = flush_suit {
        let mut suited: Vec<u8> = cards
            .iter()
            .filter(|c| c.suit() as usize == fs)
            .map(|c| value_of(c.rank()))
            .collect();
        suited.sort_unstable_by(|a, b| b.cmp(a));
        suited.truncate(5);
        return HandRank::new(HandRankCategory::Flush, suited);
    }
    if let Some(high) = straight_high(&values) {
        return HandRank::new(HandRankCategory::Straight, vec![high]);
    }
    if let Some((trip, _)) = find_of_a_kind(&counts, 3) {
        let kickers = kickers_excluding(&counts, &[trip], 2);
        let mut t = vec![trip];
        t.extend(kickers);
        return HandRank::new(HandRankCategory::ThreeKind, t);
    }

    let pairs = paired_values(&counts);
    match pairs.as_slice() {
        [hi, lo, ..] => {
            let kicker = kickers_excluding(&counts, &[*hi, *lo], 1);
            let mut t = vec![*hi, *lo];
            t.extend(kicker);
            HandRank::new(HandRankCategory::TwoPair, t)
        }
        [pair] => {
            let kickers = kickers_excluding(&counts, &[*pair], 3);
            let mut t = vec![*pair];
            t.extend(kickers);
            HandRank::new(HandRankCategory::Pair, t)
        }
        [] => HandRank::new(HandRankCategory::HighCard, kickers_excluding(&counts, &[], 5)),
    }
}

#[inline]
fn value_of(rank: CardRank) -> u8 {
    match rank {
        CardRank::Ace => 14,
        other => other as u8 + 1,
    }
}

/// The suit holding five or more cards, if any.
fn flush_suit(cards: &[Card]) -> Option<usize> {
    let mut per_suit = [0usize; NUM_SUITS];
    for c in cards {
        per_suit[c.suit() as usize] += 1;
    }
    (0..NUM_SUITS).find(|&s| per_suit[s] >= 5)
}

/// Highest straight top-card among `values`, honouring the wheel (A-5).
fn straight_high(values: &[u8]) -> Option<u8> {
    let mut present = [false; VALUE_SLOTS];
    for &v in values {
        present[v as usize] = true;
    }
    if present[14] {
        present[1] = true; // Ace also plays low
    }
    let mut best = None;
    for high in (5..=14u8).rev() {
        if (high - 4..=high).all(|v| present[v as usize]) {
            best = Some(high);
            break;
        }
    }
    best
}

/// Highest value appearing exactly `n` times, with its top kicker.
fn find_of_a_kind(counts: &[u8; VALUE_SLOTS], n: u8) -> Option<(u8, u8)> {
    let rank = (2..=14u8).rev().find(|&v| counts[v as usize] == n)?;
    let kicker = (2..=14u8)
        .rev()
        .find(|&v| v != rank && counts[v as usize] > 0)
        .unwrap_or(0);
    Some((rank, kicker))
}

fn find_full_house(counts: &[u8; VALUE_SLOTS]) -> Option<HandRank> {
    let mut trips: Vec<u8> = Vec::new();
    let mut pairs: Vec<u8> = Vec::new();
    for v in (2..=14u8).rev() {
        match counts[v as usize] {
            c if c >= 3 => trips.push(v),
            2 => pairs.push(v),
            _ => {}
        }
    }
    let trip = *trips.first()?;
    // A second set of trips plays as the pair.
    let pair = pairs.first().copied().or_else(|| trips.get(1).copied())?;
    Some(HandRank::new(HandRankCategory::FullHouse, vec![trip, pair]))
}

/// Values appearing at least twice, descending.
fn paired_values(counts: &[u8; VALUE_SLOTS]) -> Vec<u8> {
    (2..=14u8)
        .rev()
        .filter(|&v| counts[v as usize] >= 2)
        .collect()
}

/// The `take` highest distinct values outside `exclude`.
fn kickers_excluding(counts: &[u8; VALUE_SLOTS], exclude: &[u8], take: usize) -> Vec<u8> {
    (2..=14u8)
        .rev()
        .filter(|&v| counts[v as usize] > 0 && !exclude.contains(&v))
        .take(take)
        .collect()
}
