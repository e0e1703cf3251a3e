//! One betting round: contributions, action legality and the rolling
//! pot/side-pot structure.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet};

use pokerd_shared::{Action, PlayerId, Pot};

/// A pot with its position in the session-cumulative numbering, used by the
/// cumulative snapshots carried in action records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedPot {
    pub id: usize,
    pub amount: u32,
    pub eligible_players: BTreeSet<PlayerId>,
}

/// One successfully applied action together with the pot structure it
/// produced, both for this round and cumulatively across the hand.
#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub player: PlayerId,
    pub action: Action,
    /// Chips actually committed by this action (a Call records the owed
    /// difference, a Fold or Check records zero).
    pub amount: u32,
    /// Milliseconds since the hand started.
    pub timestamp_ms: u64,
    pub pot_after: u32,
    pub side_pots_after: Vec<Pot>,
    pub total_pot_after: u32,
    pub total_side_pots_after: Vec<IndexedPot>,
}

/// Derive the pot structure from contributions and the fold set.
///
/// Pure function, re-run after every applied action. Levels are the distinct
/// positive contribution amounts in ascending order; the pot at level `t`
/// with predecessor `p` holds `(t - p)` chips from every player whose
/// contribution reaches `t` (folded chips stay in, so the pot total always
/// equals the contribution total), while eligibility excludes folded
/// players. Equal contributions collapse to a single pot; with no positive
/// contributions one empty pot covering every non-folded player remains.
pub fn derive_pots(
    contributions: &BTreeMap<PlayerId, u32>,
    folded: &BTreeSet<PlayerId>,
) -> Vec<Pot> {
    let mut levels: Vec<u32> = contributions
        .values()
        .copied()
        .filter(|&c| c > 0)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    if levels.is_empty() {
        let eligible = contributions
            .keys()
            .copied()
            .filter(|p| !folded.contains(p))
            .collect();
        return vec![Pot::new(0, eligible)];
    }

    let mut pots = Vec::with_capacity(levels.len());
    let mut prev = 0u32;
    for &level in &levels {
        let contributors = contributions.values().filter(|&&c| c >= level).count() as u32;
        let eligible: BTreeSet<PlayerId> = contributions
            .iter()
            .filter(|&(p, &c)| c >= level && !folded.contains(p))
            .map(|(&p, _)| p)
            .collect();
        pots.push(Pot::new((level - prev) * contributors, eligible));
        prev = level;
    }
    pots
}

/// Betting state for a single round.
#[derive(Clone, Debug)]
pub struct RoundState {
    contributions: BTreeMap<PlayerId, u32>,
    high_bet: u32,
    last_aggressor: Option<PlayerId>,
    to_act: BTreeSet<PlayerId>,
    actions: BTreeMap<PlayerId, Option<Action>>,
    folded: BTreeSet<PlayerId>,
    all_in: BTreeSet<PlayerId>,
    pots: Vec<Pot>,
    history: Vec<ActionRecord>,
    action_times: BTreeMap<PlayerId, u64>,
    // Cumulative view of the preceding rounds, set by the hand before each
    // apply so records can carry hand-wide totals.
    cumulative_pot: u32,
    cumulative_side_pots: Vec<IndexedPot>,
}

impl RoundState {
    /// Fresh round over the given actors; everybody owes an action and the
    /// main pot covers everyone.
    pub fn new(active: &[PlayerId]) -> Self {
        RoundState {
            contributions: active.iter().map(|&p| (p, 0)).collect(),
            high_bet: 0,
            last_aggressor: None,
            to_act: active.iter().copied().collect(),
            actions: BTreeMap::new(),
            folded: BTreeSet::new(),
            all_in: BTreeSet::new(),
            pots: vec![Pot::new(0, active.iter().copied().collect())],
            history: Vec::new(),
            action_times: BTreeMap::new(),
            cumulative_pot: 0,
            cumulative_side_pots: Vec::new(),
        }
    }

    /// Apply one action, enforcing the betting rules. `now_ms` is the
    /// hand-relative timestamp recorded in the history.
    pub fn apply(&mut self, player: PlayerId, action: Action, now_ms: u64) -> Result<()> {
        if !self.to_act.contains(&player) {
            bail!("player {player} is not waiting to act");
        }

        let committed = match action {
            Action::Fold => {
                self.to_act.remove(&player);
                self.folded.insert(player);
                self.actions.insert(player, Some(action));
                0
            }
            Action::Check => {
                if self.last_aggressor.is_some() {
                    bail!("cannot check once the bet stands at {}", self.high_bet);
                }
                self.to_act.remove(&player);
                self.actions.insert(player, Some(action));
                0
            }
            Action::Call => {
                let owed = self.high_bet.saturating_sub(self.contributions[&player]);
                if owed == 0 {
                    bail!("nothing to call");
                }
                *self.contributions.get_mut(&player).expect("known player") += owed;
                self.to_act.remove(&player);
                self.actions.insert(player, Some(action));
                owed
            }
            Action::Raise(amount) => {
                if self.contributions[&player] + amount <= self.high_bet {
                    bail!(
                        "raise to {} does not exceed the current bet of {}",
                        self.contributions[&player] + amount,
                        self.high_bet
                    );
                }
                *self.contributions.get_mut(&player).expect("known player") += amount;
                self.high_bet = self.contributions[&player];
                self.actions.insert(player, Some(action));
                self.reopen(player);
                amount
            }
            Action::AllIn(amount) => {
                *self.contributions.get_mut(&player).expect("known player") += amount;
                self.all_in.insert(player);
                self.to_act.remove(&player);
                self.actions.insert(player, Some(action));
                // An all-in above the standing bet plays as a raise; a short
                // all-in does not reopen the action.
                if self.contributions[&player] > self.high_bet {
                    self.high_bet = self.contributions[&player];
                    self.reopen(player);
                }
                amount
            }
        };

        self.pots = derive_pots(&self.contributions, &self.folded);
        self.action_times.insert(player, now_ms);

        let total_side_pots_after = self.cumulative_with_current();
        self.history.push(ActionRecord {
            player,
            action,
            amount: committed,
            timestamp_ms: now_ms,
            pot_after: self.pot(),
            side_pots_after: self.pots.clone(),
            total_pot_after: self.cumulative_pot + self.pot(),
            total_side_pots_after,
        });
        Ok(())
    }

    /// A raise (or raising all-in) puts everyone else back on the clock and
    /// clears their recorded action.
    fn reopen(&mut self, aggressor: PlayerId) {
        self.last_aggressor = Some(aggressor);
        self.to_act = self
            .contributions
            .keys()
            .copied()
            .filter(|p| {
                *p != aggressor && !self.folded.contains(p) && !self.all_in.contains(p)
            })
            .collect();
        for p in &self.to_act {
            self.actions.insert(*p, None);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.to_act.is_empty()
    }

    /// Players still owing an action this round.
    pub fn current_actors(&self) -> &BTreeSet<PlayerId> {
        &self.to_act
    }

    /// Total chips contributed this round.
    pub fn pot(&self) -> u32 {
        self.contributions.values().sum()
    }

    pub fn high_bet(&self) -> u32 {
        self.high_bet
    }

    pub fn last_aggressor(&self) -> Option<PlayerId> {
        self.last_aggressor
    }

    pub fn contributions(&self) -> &BTreeMap<PlayerId, u32> {
        &self.contributions
    }

    pub fn actions(&self) -> &BTreeMap<PlayerId, Option<Action>> {
        &self.actions
    }

    pub fn folded(&self) -> &BTreeSet<PlayerId> {
        &self.folded
    }

    pub fn all_in_players(&self) -> &BTreeSet<PlayerId> {
        &self.all_in
    }

    pub fn side_pots(&self) -> &[Pot] {
        &self.pots
    }

    pub fn history(&self) -> &[ActionRecord] {
        &self.history
    }

    pub fn action_times(&self) -> &BTreeMap<PlayerId, u64> {
        &self.action_times
    }

    /// Install the cumulative pot view of all completed rounds, so records
    /// produced by subsequent applies carry hand-wide totals.
    pub fn set_cumulative(&mut self, pot: u32, side_pots: Vec<IndexedPot>) {
        self.cumulative_pot = pot;
        self.cumulative_side_pots = side_pots;
    }

    fn cumulative_with_current(&self) -> Vec<IndexedPot> {
        let mut all = self.cumulative_side_pots.clone();
        let mut next_id = all.len();
        for pot in &self.pots {
            all.push(IndexedPot {
                id: next_id,
                amount: pot.amount,
                eligible_players: pot.eligible_players.clone(),
            });
            next_id += 1;
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ns: &[usize]) -> Vec<PlayerId> {
        ns.iter().map(|&n| PlayerId(n)).collect()
    }

    fn conservation_holds(rs: &RoundState) {
        let pots: u32 = rs.side_pots().iter().map(|p| p.amount).sum();
        assert_eq!(pots, rs.pot(), "pot total must equal contribution total");
    }

    fn eligibility_holds(rs: &RoundState) {
        let mut threshold = 0u32;
        for pot in rs.side_pots() {
            // Thresholds ascend; reconstruct them from the level widths.
            let contributors = rs
                .contributions()
                .values()
                .filter(|&&c| c > threshold)
                .count() as u32;
            if contributors > 0 {
                threshold += pot.amount / contributors;
            }
            for (p, &c) in rs.contributions() {
                let eligible = pot.eligible_players.contains(p);
                let expected = c >= threshold && !rs.folded().contains(p);
                assert_eq!(eligible, expected, "eligibility mismatch for {p}");
            }
        }
    }

    #[test]
    fn check_around_completes_round() {
        let players = ids(&[1, 2, 3]);
        let mut rs = RoundState::new(&players);
        for p in &players {
            rs.apply(*p, Action::Check, 0).unwrap();
        }
        assert!(rs.is_complete());
        assert_eq!(rs.pot(), 0);
        assert_eq!(rs.side_pots().len(), 1);
        assert_eq!(rs.side_pots()[0].amount, 0);
    }

    #[test]
    fn check_is_illegal_after_a_raise() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(10), 0).unwrap();
        assert!(rs.apply(PlayerId(2), Action::Check, 1).is_err());
        // The failed check must leave player 2 on the clock.
        assert!(rs.current_actors().contains(&PlayerId(2)));
    }

    #[test]
    fn call_requires_an_outstanding_bet() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        assert!(rs.apply(PlayerId(1), Action::Call, 0).is_err());
    }

    #[test]
    fn raise_must_exceed_high_bet() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(20), 0).unwrap();
        assert!(rs.apply(PlayerId(2), Action::Raise(20), 1).is_err());
        assert!(rs.apply(PlayerId(2), Action::Raise(25), 2).is_ok());
        assert_eq!(rs.high_bet(), 25);
    }

    #[test]
    fn acting_out_of_turn_is_rejected() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Check, 0).unwrap();
        assert!(rs.apply(PlayerId(1), Action::Check, 1).is_err());
    }

    #[test]
    fn raise_reopens_and_clears_actions() {
        let players = ids(&[1, 2, 3]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(10), 0).unwrap();
        rs.apply(PlayerId(2), Action::Call, 1).unwrap();
        assert_eq!(rs.current_actors(), &BTreeSet::from([PlayerId(3)]));
        rs.apply(PlayerId(3), Action::Raise(30), 2).unwrap();
        // Players 1 and 2 are back on the clock with their actions cleared.
        assert_eq!(
            rs.current_actors(),
            &BTreeSet::from([PlayerId(1), PlayerId(2)])
        );
        assert_eq!(rs.actions()[&PlayerId(1)], None);
        assert_eq!(rs.actions()[&PlayerId(2)], None);
        assert_eq!(rs.last_aggressor(), Some(PlayerId(3)));
        conservation_holds(&rs);
    }

    #[test]
    fn short_all_in_does_not_reopen() {
        let players = ids(&[1, 2, 3]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(100), 0).unwrap();
        rs.apply(PlayerId(2), Action::AllIn(40), 1).unwrap();
        // Player 1 already matched the high bet; only player 3 still owes.
        assert_eq!(rs.last_aggressor(), Some(PlayerId(1)));
        assert_eq!(rs.current_actors(), &BTreeSet::from([PlayerId(3)]));
        rs.apply(PlayerId(3), Action::Call, 2).unwrap();
        assert!(rs.is_complete());
        assert!(rs.all_in_players().contains(&PlayerId(2)));
        conservation_holds(&rs);
        eligibility_holds(&rs);
    }

    #[test]
    fn raising_all_in_reopens() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(30), 0).unwrap();
        rs.apply(PlayerId(2), Action::AllIn(80), 1).unwrap();
        assert_eq!(rs.last_aggressor(), Some(PlayerId(2)));
        assert_eq!(rs.current_actors(), &BTreeSet::from([PlayerId(1)]));
        assert_eq!(rs.high_bet(), 80);
    }

    #[test]
    fn side_pots_track_unequal_stakes() {
        let players = ids(&[1, 2, 3]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::AllIn(50), 0).unwrap();
        rs.apply(PlayerId(2), Action::Raise(100), 1).unwrap();
        rs.apply(PlayerId(3), Action::Call, 2).unwrap();
        assert!(rs.is_complete());

        let pots = rs.side_pots();
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, 150);
        assert_eq!(
            pots[0].eligible_players,
            BTreeSet::from([PlayerId(1), PlayerId(2), PlayerId(3)])
        );
        assert_eq!(pots[1].amount, 100);
        assert_eq!(
            pots[1].eligible_players,
            BTreeSet::from([PlayerId(2), PlayerId(3)])
        );
        conservation_holds(&rs);
        eligibility_holds(&rs);
    }

    #[test]
    fn folded_chips_stay_in_the_pot() {
        let players = ids(&[1, 2, 3]);
        let mut rs = RoundState::new(&players);
        rs.apply(PlayerId(1), Action::Raise(60), 0).unwrap();
        rs.apply(PlayerId(2), Action::Raise(100), 1).unwrap();
        rs.apply(PlayerId(3), Action::Fold, 2).unwrap();
        rs.apply(PlayerId(1), Action::Fold, 3).unwrap();
        assert!(rs.is_complete());

        // 60 + 100 + 0 contributed; nothing may leak out of the pots.
        conservation_holds(&rs);
        let total: u32 = rs.side_pots().iter().map(|p| p.amount).sum();
        assert_eq!(total, 160);
        // Only player 2 remains eligible anywhere.
        for pot in rs.side_pots() {
            assert!(pot.eligible_players.is_subset(&BTreeSet::from([PlayerId(2)])));
        }
    }

    #[test]
    fn history_records_committed_amounts_and_totals() {
        let players = ids(&[1, 2]);
        let mut rs = RoundState::new(&players);
        rs.set_cumulative(
            30,
            vec![IndexedPot {
                id: 0,
                amount: 30,
                eligible_players: BTreeSet::from([PlayerId(1), PlayerId(2)]),
            }],
        );
        rs.apply(PlayerId(1), Action::Raise(20), 5).unwrap();
        rs.apply(PlayerId(2), Action::Call, 9).unwrap();

        let history = rs.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].amount, 20); // the owed difference
        assert_eq!(history[1].timestamp_ms, 9);
        assert_eq!(history[1].pot_after, 40);
        assert_eq!(history[1].total_pot_after, 70);
        assert_eq!(history[1].total_side_pots_after[0].id, 0);
        assert_eq!(history[1].total_side_pots_after[1].id, 1);
        assert_eq!(rs.action_times()[&PlayerId(2)], 9);
    }

    #[test]
    fn no_contributions_keeps_single_empty_pot() {
        let contributions: BTreeMap<PlayerId, u32> =
            [(PlayerId(1), 0), (PlayerId(2), 0)].into();
        let pots = derive_pots(&contributions, &BTreeSet::new());
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 0);
        assert_eq!(
            pots[0].eligible_players,
            BTreeSet::from([PlayerId(1), PlayerId(2)])
        );
    }

    #[test]
    fn over_contributing_folder_creates_unclaimable_level() {
        // A folder who out-bet every survivor leaves a top level nobody
        // still in the hand can win; the hand-level settlement refunds it.
        let contributions: BTreeMap<PlayerId, u32> =
            [(PlayerId(1), 20), (PlayerId(2), 30), (PlayerId(3), 100)].into();
        let folded = BTreeSet::from([PlayerId(3)]);
        let pots = derive_pots(&contributions, &folded);
        assert_eq!(pots.len(), 3);
        assert_eq!(pots[0].amount, 60);
        assert_eq!(pots[1].amount, 20);
        assert_eq!(pots[2].amount, 70);
        assert!(pots[2].eligible_players.is_empty());
        let total: u32 = pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 150);
    }
}
