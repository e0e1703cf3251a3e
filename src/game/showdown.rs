//! Pot awarding at the end of a hand.

use std::collections::BTreeMap;

use pokerd_shared::{PlayerId, Pot};

use crate::poker::HandRank;

/// Award every pot to the strongest eligible hand.
///
/// Ties split by integer division with the remainder going to the first tied
/// winner in seat order. A pot with a single eligible player needs no
/// ranking (covering the uncontested-hand case, where no showdown happens).
/// A pot nobody surviving can claim (a folder who out-bet every survivor)
/// is refunded to its contributors so the hand stays zero-sum.
pub(crate) fn award_pots(
    pots: &[Pot],
    contributions: &BTreeMap<PlayerId, u32>,
    ranks: &BTreeMap<PlayerId, HandRank>,
    seat_order: &[PlayerId],
) -> BTreeMap<PlayerId, u32> {
    // Thresholds mirror the derivation: the distinct positive contribution
    // levels, ascending, one per pot.
    let mut levels: Vec<u32> = contributions
        .values()
        .copied()
        .filter(|&c| c > 0)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut awards: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for (i, pot) in pots.iter().enumerate() {
        if pot.amount == 0 {
            continue;
        }
        let recipients: Vec<PlayerId> = if pot.eligible_players.is_empty() {
            // Unclaimable level: give the chips back to whoever put them in.
            let threshold = levels.get(i).copied().unwrap_or(u32::MAX);
            seat_order
                .iter()
                .copied()
                .filter(|p| contributions.get(p).copied().unwrap_or(0) >= threshold)
                .collect()
        } else if pot.eligible_players.len() == 1 {
            pot.eligible_players.iter().copied().collect()
        } else {
            let best = pot
                .eligible_players
                .iter()
                .filter_map(|p| ranks.get(p))
                .max();
            let Some(best) = best else {
                continue;
            };
            seat_order
                .iter()
                .copied()
                .filter(|p| {
                    pot.eligible_players.contains(p) && ranks.get(p) == Some(best)
                })
                .collect()
        };
        if recipients.is_empty() {
            continue;
        }

        let share = pot.amount / recipients.len() as u32;
        let remainder = pot.amount % recipients.len() as u32;
        for (j, winner) in recipients.iter().enumerate() {
            let mut won = share;
            if j == 0 {
                won += remainder;
            }
            *awards.entry(*winner).or_insert(0) += won;
        }
    }
    awards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poker::{HandRank, HandRankCategory};
    use std::collections::BTreeSet;

    fn rank(category: HandRankCategory, tb: &[u8]) -> HandRank {
        HandRank::new(category, tb.to_vec())
    }

    #[test]
    fn remainder_goes_to_first_winner_in_seat_order() {
        let pots = vec![Pot::new(
            101,
            BTreeSet::from([PlayerId(1), PlayerId(2)]),
        )];
        let contributions = BTreeMap::from([(PlayerId(1), 50), (PlayerId(2), 51)]);
        let tied = rank(HandRankCategory::Pair, &[9, 14, 13, 12]);
        let ranks = BTreeMap::from([(PlayerId(1), tied.clone()), (PlayerId(2), tied)]);
        let awards = award_pots(&pots, &contributions, &ranks, &[PlayerId(1), PlayerId(2)]);
        assert_eq!(awards[&PlayerId(1)], 51);
        assert_eq!(awards[&PlayerId(2)], 50);
    }

    #[test]
    fn side_pot_goes_to_best_eligible_only() {
        let pots = vec![
            Pot::new(150, BTreeSet::from([PlayerId(1), PlayerId(2), PlayerId(3)])),
            Pot::new(100, BTreeSet::from([PlayerId(2), PlayerId(3)])),
        ];
        let contributions = BTreeMap::from([
            (PlayerId(1), 50),
            (PlayerId(2), 100),
            (PlayerId(3), 100),
        ]);
        // Player 1 holds the strongest hand but is only in the main pot.
        let ranks = BTreeMap::from([
            (PlayerId(1), rank(HandRankCategory::ThreeKind, &[14, 13, 9])),
            (PlayerId(2), rank(HandRankCategory::Pair, &[13, 14, 9, 7])),
            (PlayerId(3), rank(HandRankCategory::HighCard, &[14, 12, 9, 7, 4])),
        ]);
        let seats = [PlayerId(1), PlayerId(2), PlayerId(3)];
        let awards = award_pots(&pots, &contributions, &ranks, &seats);
        assert_eq!(awards[&PlayerId(1)], 150);
        assert_eq!(awards[&PlayerId(2)], 100);
        assert_eq!(awards.get(&PlayerId(3)), None);
    }

    #[test]
    fn unclaimable_pot_is_refunded_to_contributors() {
        let pots = vec![
            Pot::new(60, BTreeSet::from([PlayerId(1), PlayerId(2)])),
            Pot::new(20, BTreeSet::from([PlayerId(2)])),
            Pot::new(70, BTreeSet::new()),
        ];
        let contributions = BTreeMap::from([
            (PlayerId(1), 20),
            (PlayerId(2), 30),
            (PlayerId(3), 100),
        ]);
        let ranks = BTreeMap::from([
            (PlayerId(1), rank(HandRankCategory::Pair, &[14, 13, 9, 7])),
            (PlayerId(2), rank(HandRankCategory::Pair, &[2, 13, 9, 7])),
        ]);
        let seats = [PlayerId(1), PlayerId(2), PlayerId(3)];
        let awards = award_pots(&pots, &contributions, &ranks, &seats);
        assert_eq!(awards[&PlayerId(1)], 60);
        assert_eq!(awards[&PlayerId(2)], 20);
        // The out-betting folder gets the unmatched level back.
        assert_eq!(awards[&PlayerId(3)], 70);
        let total: u32 = awards.values().sum();
        let contributed: u32 = contributions.values().sum();
        assert_eq!(total, contributed);
    }
}
