//! A 52-card deck dealt without replacement.

use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

use pokerd_shared::Card;

/// Ordered card sequence created fresh for every hand. Shuffling consumes an
/// injected random source so tests can seed the permutation.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// All 52 cards in canonical order (clubs, diamonds, hearts, spades).
    pub fn new() -> Self {
        Deck {
            cards: (0..52).map(Card).collect(),
        }
    }

    /// Uniformly permute the remaining cards in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.make_contiguous().shuffle(rng);
    }

    /// A freshly shuffled deck.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Deck::new();
        deck.shuffle(rng);
        deck
    }

    /// Remove and return the next `k` cards.
    pub fn deal(&mut self, k: usize) -> Result<Vec<Card>> {
        if self.cards.len() < k {
            bail!(
                "deck underflow: {} cards requested, {} remain",
                k,
                self.cards.len()
            );
        }
        Ok(self.cards.drain(..k).collect())
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Deck::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn fresh_deck_has_all_52_cards() {
        let mut deck = Deck::new();
        let cards = deck.deal(52).unwrap();
        let distinct: HashSet<_> = cards.iter().collect();
        assert_eq!(distinct.len(), 52);
        assert_eq!(deck.remaining(), 0);
    }

    #[test]
    fn dealing_removes_without_replacement() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut deck = Deck::shuffled(&mut rng);
        let first = deck.deal(2).unwrap();
        let rest = deck.deal(50).unwrap();
        assert_eq!(deck.remaining(), 0);
        for c in &first {
            assert!(!rest.contains(c));
        }
    }

    #[test]
    fn underflow_is_an_error() {
        let mut deck = Deck::new();
        deck.deal(50).unwrap();
        assert!(deck.deal(3).is_err());
        // The failed deal must not consume anything.
        assert_eq!(deck.remaining(), 2);
    }

    #[test]
    fn seeded_shuffles_are_reproducible() {
        let mut a = Deck::shuffled(&mut StdRng::seed_from_u64(42));
        let mut b = Deck::shuffled(&mut StdRng::seed_from_u64(42));
        assert_eq!(a.deal(52).unwrap(), b.deal(52).unwrap());
    }
}
