//! One poker hand: a deal, up to four betting rounds, and settlement.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use pokerd_shared::{Action, Card, GameStateMsg, PlayerId, Pot, Round};

use super::round::{derive_pots, IndexedPot, RoundState};
use super::showdown;
use crate::poker::{Deck, HandEvaluator, StandardEvaluator};

/// Snapshot of a completed betting round, kept for the hand log and for
/// cumulative pot accounting.
#[derive(Clone, Debug)]
pub struct RoundArchive {
    pub pot: u32,
    pub bets: BTreeMap<PlayerId, u32>,
    pub actions: BTreeMap<PlayerId, Option<Action>>,
    pub records: Vec<super::round::ActionRecord>,
    pub action_times: BTreeMap<PlayerId, u64>,
    pub final_pots: Vec<Pot>,
}

/// A single hand of no-limit hold'em over a fixed seat list.
///
/// The session owns the hand and drives it strictly sequentially: deal via
/// [`Hand::start`], feed actions through [`Hand::apply`], advance streets
/// with [`Hand::end_round`]/[`Hand::start_round`], settle with
/// [`Hand::end_hand`].
pub struct Hand {
    pub(crate) players: Vec<PlayerId>,
    pub(crate) active: Vec<PlayerId>,
    pub(crate) hole: BTreeMap<PlayerId, [Card; 2]>,
    pub(crate) board: Vec<Card>,
    deck: Deck,
    pub(crate) round_index: usize,
    round: Option<RoundState>,
    pub(crate) archives: BTreeMap<usize, RoundArchive>,
    pub(crate) dealer_button: usize,
    pub(crate) small_blind: Option<PlayerId>,
    pub(crate) big_blind: Option<PlayerId>,
    pub(crate) blind: u32,
    post_blinds: bool,
    pub(crate) score: BTreeMap<PlayerId, i64>,
    pub(crate) hand_id: String,
    pub(crate) sequence: Option<u64>,
    pub(crate) final_pots: Vec<Pot>,
    started_at: Option<Instant>,
    running: bool,
    evaluator: Arc<dyn HandEvaluator>,
    debug: bool,
}

impl Hand {
    /// A hand with the given big-blind size; the small blind is half of it.
    pub fn new(blind: u32, sequence: Option<u64>) -> Self {
        Hand {
            players: Vec::new(),
            active: Vec::new(),
            hole: BTreeMap::new(),
            board: Vec::new(),
            deck: Deck::new(),
            round_index: 0,
            round: None,
            archives: BTreeMap::new(),
            dealer_button: 0,
            small_blind: None,
            big_blind: None,
            blind,
            post_blinds: false,
            score: BTreeMap::new(),
            hand_id: String::new(),
            sequence,
            final_pots: Vec::new(),
            started_at: None,
            running: false,
            evaluator: Arc::new(StandardEvaluator),
            debug: false,
        }
    }

    /// Substitute the hand-strength ordering (tests inject fixed orderings).
    pub fn with_evaluator(mut self, evaluator: Arc<dyn HandEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Post both blinds server-side as opening raises at `start`.
    pub fn with_posted_blinds(mut self, post: bool) -> Self {
        self.post_blinds = post;
        self
    }

    /// Enable the card-forcing hooks used by scenario tests.
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn add_player(&mut self, player: PlayerId) -> Result<()> {
        if self.running {
            bail!("cannot seat a player while the hand is running");
        }
        self.players.push(player);
        self.active.push(player);
        Ok(())
    }

    pub fn set_dealer_button(&mut self, seat: usize) {
        self.dealer_button = seat;
    }

    /// Deal from the provided (already shuffled) deck and open the preflop
    /// betting round.
    pub fn start(&mut self, deck: Deck) -> Result<()> {
        if self.running {
            bail!("hand already running");
        }
        if self.players.len() < 2 {
            bail!("a hand needs at least two players");
        }
        self.deck = deck;
        self.board.clear();
        self.archives.clear();
        self.final_pots.clear();
        self.round_index = Round::Preflop.index();
        self.hand_id = Uuid::new_v4().to_string();
        self.started_at = Some(Instant::now());
        self.running = true;

        self.active = self.players.clone();
        self.score = self.players.iter().map(|&p| (p, 0i64)).collect();
        self.hole.clear();
        let players = self.players.clone();
        for &p in &players {
            let cards = self.deck.deal(2)?;
            self.hole.insert(p, [cards[0], cards[1]]);
        }

        self.assign_blinds();
        self.round = Some(RoundState::new(&self.active));

        if self.post_blinds {
            let (sb, bb) = self.blinds();
            if let (Some(small), Some(big)) = (self.small_blind, self.big_blind) {
                if sb > 0 {
                    self.apply(small, Action::Raise(sb))?;
                }
                self.apply(big, Action::Raise(bb))?;
            }
        }
        Ok(())
    }

    /// Small- and big-blind amounts.
    pub fn blinds(&self) -> (u32, u32) {
        (self.blind / 2, self.blind)
    }

    /// Heads-up the dealer posts the small blind; otherwise the two seats
    /// left of the button post.
    fn assign_blinds(&mut self) {
        let n = self.active.len();
        if n < 2 {
            return;
        }
        let (sb_seat, bb_seat) = if n == 2 {
            (self.dealer_button % n, (self.dealer_button + 1) % n)
        } else {
            ((self.dealer_button + 1) % n, (self.dealer_button + 2) % n)
        };
        self.small_blind = Some(self.active[sb_seat]);
        self.big_blind = Some(self.active[bb_seat]);
    }

    pub fn small_blind_player(&self) -> Option<PlayerId> {
        self.small_blind
    }

    pub fn big_blind_player(&self) -> Option<PlayerId> {
        self.big_blind
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_round(&self) -> Round {
        Round::from_index(self.round_index).unwrap_or(Round::River)
    }

    pub fn board(&self) -> &[Card] {
        &self.board
    }

    pub fn hole_cards(&self, player: PlayerId) -> Option<[Card; 2]> {
        self.hole.get(&player).copied()
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn active_players(&self) -> &[PlayerId] {
        &self.active
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn seat_of(&self, player: PlayerId) -> Option<usize> {
        self.players.iter().position(|&p| p == player)
    }

    /// Whether the player's recorded action in the previous round was an
    /// all-in; such players are carried through later streets without being
    /// solicited.
    pub fn carried_all_in(&self, player: PlayerId) -> bool {
        if self.round_index == 0 {
            return false;
        }
        self.archives
            .get(&(self.round_index - 1))
            .and_then(|a| a.actions.get(&player))
            .map(|a| matches!(a, Some(Action::AllIn(_))))
            .unwrap_or(false)
    }

    /// Apply a player's action to the current round. A carried all-in player
    /// has whatever arrived replaced with a zero-amount all-in, so stray
    /// messages from them cannot corrupt the round.
    pub fn apply(&mut self, player: PlayerId, action: Action) -> Result<()> {
        if !self.running {
            bail!("no hand in progress");
        }
        if !self.active.contains(&player) {
            bail!("player {player} is not active in this hand");
        }
        let action = if self.carried_all_in(player) {
            Action::AllIn(0)
        } else {
            action
        };

        let (cumulative_pot, cumulative_pots) = self.cumulative_view();
        let now = self.elapsed_ms();
        let round = self.round.as_mut().ok_or_else(|| {
            anyhow::anyhow!("no betting round open")
        })?;
        round.set_cumulative(cumulative_pot, cumulative_pots);
        round.apply(player, action, now)?;

        if matches!(action, Action::Fold) {
            self.active.retain(|&p| p != player);
        }
        Ok(())
    }

    /// Pot total and numbered side pots of all archived rounds, in order.
    fn cumulative_view(&self) -> (u32, Vec<IndexedPot>) {
        let mut pot = 0u32;
        let mut pots = Vec::new();
        for archive in self.archives.values() {
            pot += archive.pot;
            for p in &archive.final_pots {
                pots.push(IndexedPot {
                    id: pots.len(),
                    amount: p.amount,
                    eligible_players: p.eligible_players.clone(),
                });
            }
        }
        (pot, pots)
    }

    pub fn is_round_complete(&self) -> bool {
        self.round.as_ref().map(|r| r.is_complete()).unwrap_or(true)
    }

    pub fn current_actors(&self) -> BTreeSet<PlayerId> {
        self.round
            .as_ref()
            .map(|r| r.current_actors().clone())
            .unwrap_or_default()
    }

    /// The next player to solicit, honouring positional order: preflop opens
    /// left of the button (heads-up: the button), later streets open left of
    /// the button, and after a raise the action continues from the seat
    /// after the aggressor.
    pub fn next_actor(&self) -> Option<PlayerId> {
        let round = self.round.as_ref()?;
        let waiting = round.current_actors();
        if waiting.is_empty() {
            return None;
        }
        let n = self.players.len();
        let start = match round.last_aggressor() {
            Some(aggressor) => (self.seat_of(aggressor)? + 1) % n,
            None => self.round_start_seat(),
        };
        (0..n)
            .map(|i| self.players[(start + i) % n])
            .find(|p| waiting.contains(p))
    }

    fn round_start_seat(&self) -> usize {
        let n = self.players.len();
        if self.round_index == Round::Preflop.index() && n == 2 {
            self.dealer_button % n
        } else {
            (self.dealer_button + 1) % n
        }
    }

    /// More betting rounds follow iff the current one is complete, the river
    /// has not been dealt, and at least two players still contest.
    pub fn is_next_round(&self) -> bool {
        self.running
            && self.round_index < Round::River.index()
            && self.is_round_complete()
            && self.active.len() >= 2
    }

    /// The hand is over once one player remains or the river betting closed.
    pub fn is_over(&self) -> bool {
        !self.running
            || self.active.len() <= 1
            || (self.round_index == Round::River.index() && self.is_round_complete())
    }

    /// Archive the completed round's snapshot into the per-round history.
    pub fn end_round(&mut self) -> Result<()> {
        if !self.is_round_complete() {
            bail!("round cannot end while players still owe an action");
        }
        if self.archives.contains_key(&self.round_index) {
            bail!("round {} already archived", self.round_index);
        }
        self.archive_current_round();
        Ok(())
    }

    fn archive_current_round(&mut self) {
        let Some(round) = self.round.as_ref() else {
            return;
        };
        self.archives.insert(
            self.round_index,
            RoundArchive {
                pot: round.pot(),
                bets: round.contributions().clone(),
                actions: round.actions().clone(),
                records: round.history().to_vec(),
                action_times: round.action_times().clone(),
                final_pots: round.side_pots().to_vec(),
            },
        );
    }

    /// Advance to the next street: burn one, deal three for the flop or one
    /// for the turn and river, and open a fresh betting round.
    pub fn start_round(&mut self) -> Result<()> {
        if !self.running {
            bail!("no hand in progress");
        }
        if !self.is_round_complete() {
            bail!("current round is not complete");
        }
        if self.round_index >= Round::River.index() {
            bail!("no betting round follows the river");
        }
        if self.active.len() < 2 {
            bail!("not enough contesting players for another round");
        }
        if !self.archives.contains_key(&self.round_index) {
            bail!("round {} has not been archived", self.round_index);
        }

        self.round_index += 1;
        self.deck.deal(1)?; // burn
        if self.round_index == Round::Flop.index() {
            self.board = self.deck.deal(3)?;
        } else {
            self.board.extend(self.deck.deal(1)?);
        }
        self.round = Some(RoundState::new(&self.active));
        Ok(())
    }

    /// Settle the hand: derive the final pots from cumulative contributions,
    /// rank the surviving hands, award every pot, and finalize the zero-sum
    /// score map.
    pub fn end_hand(&mut self) -> Result<&BTreeMap<PlayerId, i64>> {
        if !self.running {
            bail!("no hand in progress");
        }
        if !self.archives.contains_key(&self.round_index) {
            // Best-effort settlement for hands cut short mid-round.
            self.archive_current_round();
        }

        let mut contributions: BTreeMap<PlayerId, u32> =
            self.players.iter().map(|&p| (p, 0)).collect();
        for archive in self.archives.values() {
            for (&p, &bet) in &archive.bets {
                *contributions.entry(p).or_insert(0) += bet;
            }
        }
        let folded: BTreeSet<PlayerId> = self
            .players
            .iter()
            .copied()
            .filter(|p| !self.active.contains(p))
            .collect();

        self.final_pots = derive_pots(&contributions, &folded);

        let mut ranks = BTreeMap::new();
        if self.active.len() >= 2 {
            for &p in &self.active {
                if let Some(hole) = self.hole.get(&p) {
                    let mut cards = hole.to_vec();
                    cards.extend(self.board.iter().copied());
                    ranks.insert(p, self.evaluator.rank(&cards));
                }
            }
        }

        let awards = showdown::award_pots(
            &self.final_pots,
            &contributions,
            &ranks,
            &self.players,
        );

        for &p in &self.players {
            let won = awards.get(&p).copied().unwrap_or(0) as i64;
            let spent = contributions.get(&p).copied().unwrap_or(0) as i64;
            self.score.insert(p, won - spent);
        }
        self.running = false;
        Ok(&self.score)
    }

    pub fn scores(&self) -> &BTreeMap<PlayerId, i64> {
        &self.score
    }

    /// The settled pot structure; empty before `end_hand`.
    pub fn final_pots(&self) -> &[Pot] {
        &self.final_pots
    }

    /// The broadcast view of the current round, or None before `start`.
    pub fn game_state(&self) -> Option<GameStateMsg> {
        let round = self.round.as_ref()?;
        let player_actions = round
            .actions()
            .iter()
            .filter_map(|(p, a)| a.map(|a| (*p, a.name().to_string())))
            .collect();
        Some(GameStateMsg {
            round_num: self.round_index,
            round: self.current_round().name().to_string(),
            community_cards: self.board.iter().map(|c| c.tag()).collect(),
            pot: round.pot(),
            current_player: round.current_actors().clone(),
            current_bet: round.high_bet(),
            player_bets: round.contributions().clone(),
            player_actions,
            min_raise: round.high_bet(),
            max_raise: round.high_bet() * 2,
            side_pots: round.side_pots().to_vec(),
        })
    }

    /// Force a player's hole cards; debug hands only.
    pub fn assign_hole_cards(&mut self, player: PlayerId, cards: [Card; 2]) -> Result<()> {
        if !self.debug {
            bail!("card forcing requires a debug hand");
        }
        if !self.players.contains(&player) {
            bail!("player {player} is not seated");
        }
        self.hole.insert(player, cards);
        Ok(())
    }

    /// Force the community board; debug hands only.
    pub fn assign_board(&mut self, board: Vec<Card>) -> Result<()> {
        if !self.debug {
            bail!("card forcing requires a debug hand");
        }
        self.board = board;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn started_hand(players: usize, button: usize) -> Hand {
        let mut hand = Hand::new(10, None);
        for i in 1..=players {
            hand.add_player(PlayerId(i)).unwrap();
        }
        hand.set_dealer_button(button);
        let mut rng = StdRng::seed_from_u64(11);
        hand.start(Deck::shuffled(&mut rng)).unwrap();
        hand
    }

    #[test]
    fn heads_up_blinds_sit_on_the_button() {
        let hand = started_hand(2, 0);
        assert_eq!(hand.small_blind_player(), Some(PlayerId(1)));
        assert_eq!(hand.big_blind_player(), Some(PlayerId(2)));
        // Heads-up the small blind (button) opens the preflop action.
        assert_eq!(hand.next_actor(), Some(PlayerId(1)));
    }

    #[test]
    fn three_handed_blinds_left_of_button() {
        let hand = started_hand(3, 0);
        assert_eq!(hand.small_blind_player(), Some(PlayerId(2)));
        assert_eq!(hand.big_blind_player(), Some(PlayerId(3)));
        // Preflop opens left of the button.
        assert_eq!(hand.next_actor(), Some(PlayerId(2)));
    }

    #[test]
    fn each_player_gets_two_distinct_hole_cards() {
        let hand = started_hand(3, 0);
        let mut seen = std::collections::HashSet::new();
        for i in 1..=3 {
            let cards = hand.hole_cards(PlayerId(i)).unwrap();
            assert!(seen.insert(cards[0]));
            assert!(seen.insert(cards[1]));
        }
    }

    #[test]
    fn action_continues_after_the_aggressor() {
        let mut hand = started_hand(3, 2); // button on seat 3 -> SB 1, BB 2
        assert!(hand.is_running());
        assert_eq!(hand.next_actor(), Some(PlayerId(1)));
        hand.apply(PlayerId(1), Action::Check).unwrap();
        hand.apply(PlayerId(2), Action::Raise(20)).unwrap();
        // Action reopens and continues with the seat after the aggressor.
        assert_eq!(
            hand.current_actors(),
            std::collections::BTreeSet::from([PlayerId(1), PlayerId(3)])
        );
        assert_eq!(hand.next_actor(), Some(PlayerId(3)));
        hand.apply(PlayerId(3), Action::Call).unwrap();
        assert_eq!(hand.next_actor(), Some(PlayerId(1)));
        hand.apply(PlayerId(1), Action::Call).unwrap();
        assert!(hand.is_round_complete());
    }

    #[test]
    fn all_in_carries_over_without_solicitation() {
        let mut hand = started_hand(2, 0);
        hand.apply(PlayerId(1), Action::AllIn(50)).unwrap();
        hand.apply(PlayerId(2), Action::Call).unwrap();
        hand.end_round().unwrap();
        hand.start_round().unwrap();
        assert!(hand.carried_all_in(PlayerId(1)));
        // Whatever arrives for the carried player becomes a zero all-in.
        hand.apply(PlayerId(1), Action::Raise(999)).unwrap();
        hand.apply(PlayerId(2), Action::Check).unwrap();
        assert!(hand.is_round_complete());
        let archive_bets = hand.archives[&0].bets.clone();
        assert_eq!(archive_bets[&PlayerId(1)], 50);
        assert_eq!(archive_bets[&PlayerId(2)], 50);
    }

    #[test]
    fn street_progression_deals_the_board() {
        let mut hand = started_hand(2, 0);
        hand.apply(PlayerId(1), Action::Check).unwrap();
        hand.apply(PlayerId(2), Action::Check).unwrap();
        hand.end_round().unwrap();
        hand.start_round().unwrap();
        assert_eq!(hand.current_round(), Round::Flop);
        assert_eq!(hand.board().len(), 3);
        for round in [Round::Turn, Round::River] {
            hand.apply(PlayerId(2), Action::Check).unwrap();
            hand.apply(PlayerId(1), Action::Check).unwrap();
            hand.end_round().unwrap();
            hand.start_round().unwrap();
            assert_eq!(hand.current_round(), round);
        }
        assert_eq!(hand.board().len(), 5);
        assert!(hand.start_round().is_err());
    }

    #[test]
    fn end_round_requires_completion() {
        let mut hand = started_hand(2, 0);
        assert!(hand.end_round().is_err());
    }

    #[test]
    fn posted_blinds_open_the_pot() {
        let mut hand = Hand::new(10, None).with_posted_blinds(true);
        hand.add_player(PlayerId(1)).unwrap();
        hand.add_player(PlayerId(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        hand.start(Deck::shuffled(&mut rng)).unwrap();
        let gs = hand.game_state().unwrap();
        assert_eq!(gs.pot, 15);
        assert_eq!(gs.current_bet, 10);
        assert_eq!(gs.player_bets[&PlayerId(1)], 5);
        assert_eq!(gs.player_bets[&PlayerId(2)], 10);
        // The small blind owes the difference.
        assert_eq!(hand.next_actor(), Some(PlayerId(1)));
    }
}
