//! The session coordinator: accept a fixed quorum of remote agents, then
//! drive hand after hand over the framed channel.
//!
//! One task owns everything. Clients are polled strictly sequentially, so at
//! any moment at most one player is being solicited and the hand state is
//! never touched concurrently.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use pokerd_shared::{Action, GameStartMsg, Message, PlayerId, RequestActionMsg};

use crate::config::Config;
use crate::game::{Hand, HandLogWriter};
use crate::poker::{Deck, HandEvaluator, StandardEvaluator};
use crate::pretty;
use crate::server::connection::{Connection, Received};
use crate::server::status::{ResultLog, StatusFile};

pub struct Session {
    cfg: Config,
    listener: TcpListener,
    connections: BTreeMap<PlayerId, Connection>,
    dealer_button: usize,
    hand_no: u64,
    next_player_id: usize,
    bankroll: BTreeMap<PlayerId, i64>,
    delta: BTreeMap<PlayerId, i64>,
    evaluator: Arc<dyn HandEvaluator>,
    log_writer: HandLogWriter,
    status: Option<StatusFile>,
    results: Option<ResultLog>,
    shutdown: watch::Receiver<bool>,
    rng: StdRng,
}

impl Session {
    /// Bind the listener and prepare the on-disk sinks. The session does not
    /// accept anyone until [`Session::run`].
    pub async fn bind(cfg: Config, shutdown: watch::Receiver<bool>) -> Result<Session> {
        let addr = format!("{}:{}", cfg.host, cfg.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding listener on {addr}"))?;
        let log_writer = HandLogWriter::new(&cfg.output_dir)?;
        let status = cfg.status_file.clone().map(StatusFile::new);
        let results = cfg.results_file.clone().map(ResultLog::new);
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Session {
            cfg,
            listener,
            connections: BTreeMap::new(),
            dealer_button: 0,
            hand_no: 0,
            next_player_id: 1,
            bankroll: BTreeMap::new(),
            delta: BTreeMap::new(),
            evaluator: Arc::new(StandardEvaluator),
            log_writer,
            status,
            results,
            shutdown,
            rng,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("reading listener address")
    }

    /// Run the session to completion: accept the quorum, play hands until
    /// the budget, quorum or an external signal ends it, then tear down.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            players = self.cfg.players,
            "session listening"
        );
        if let Some(status) = &self.status {
            status.mark_running()?;
        }

        match self.accept_players().await {
            Ok(()) => self.run_hands().await,
            Err(err) => tracing::info!(reason = %err, "session never reached quorum"),
        }

        self.close_all("session over").await;
        if let Some(status) = &self.status {
            status.mark_done()?;
        }
        tracing::info!(hands = self.hand_no, "session ended");
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Block until exactly the required number of players are connected,
    /// greeting each with its assigned id.
    async fn accept_players(&mut self) -> Result<()> {
        while self.connections.len() < self.cfg.players {
            tokio::select! {
                _ = shutdown_signalled(&mut self.shutdown) => {
                    bail!("shutdown requested while waiting for players");
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.context("accepting connection")?;
                    let id = PlayerId(self.next_player_id);
                    self.next_player_id += 1;
                    let mut conn = Connection::new(id, addr, stream);
                    if let Err(err) = conn.send(&Message::Connect { player_id: id }).await {
                        tracing::warn!(%addr, error = %err, "greeting failed, dropping connection");
                        continue;
                    }
                    let _ = conn
                        .send(&Message::text(format!(
                            "Welcome to the table! Your ID is {id}"
                        )))
                        .await;
                    self.bankroll.insert(id, self.cfg.initial_chips);
                    self.delta.insert(id, 0);
                    self.connections.insert(id, conn);
                    tracing::info!(player = %id, %addr, seated = self.connections.len(), "player connected");
                }
            }
        }
        Ok(())
    }

    /// Continuous play: one hand after another while the budget and quorum
    /// allow, rotating the dealer button between hands.
    async fn run_hands(&mut self) {
        loop {
            if self.is_shutdown() {
                tracing::info!("shutdown requested, ending session");
                break;
            }
            if self.connections.len() < self.cfg.players {
                tracing::info!(
                    connected = self.connections.len(),
                    required = self.cfg.players,
                    "quorum lost, ending session"
                );
                break;
            }
            if let Some(budget) = self.cfg.hands {
                if self.hand_no >= budget {
                    tracing::info!(hands = budget, "hand budget exhausted");
                    break;
                }
            }

            self.hand_no += 1;
            if let Err(err) = self.run_hand().await {
                tracing::error!(hand = self.hand_no, error = %err, "hand aborted");
            }

            if !self.connections.is_empty() {
                self.dealer_button = (self.dealer_button + 1) % self.connections.len();
            }
            if self.cfg.hand_delay_ms > 0 && !self.is_shutdown() {
                tokio::time::sleep(self.cfg.hand_delay()).await;
            }
        }
    }

    async fn run_hand(&mut self) -> Result<()> {
        let hand_no = self.hand_no;
        let mut hand = Hand::new(self.cfg.blind, Some(hand_no))
            .with_evaluator(self.evaluator.clone())
            .with_posted_blinds(self.cfg.post_blinds);
        let ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        for &id in &ids {
            hand.add_player(id)?;
        }
        hand.set_dealer_button(self.dealer_button);
        hand.start(Deck::shuffled(&mut self.rng))?;
        tracing::info!(hand = hand_no, button = self.dealer_button, "hand started");

        self.broadcast(&Message::text(format!("Hand #{hand_no} starting!")))
            .await;
        let small = hand.small_blind_player();
        let big = hand.big_blind_player();
        for &id in &ids {
            let Some(hole) = hand.hole_cards(id) else {
                continue;
            };
            self.send_to(
                id,
                &Message::GameStart(GameStartMsg {
                    message: format!("Hand #{hand_no} initiated!"),
                    hands: hole.iter().map(|c| c.tag()).collect(),
                    blind_amount: self.cfg.blind,
                    is_small_blind: small == Some(id),
                    is_big_blind: big == Some(id),
                }),
            )
            .await;
        }
        self.broadcast_state(&hand).await;
        self.broadcast(&Message::RoundStart {
            round: hand.current_round().name().to_string(),
        })
        .await;

        if let Err(err) = self.drive_betting(&mut hand).await {
            // State errors are fatal to the hand only; settle what we have.
            tracing::error!(hand = hand_no, error = %err, "hand state error, settling early");
        }

        let scores = hand.end_hand()?.clone();
        self.broadcast(&Message::text(format!("Hand #{hand_no} over!")))
            .await;
        tracing::info!(
            hand = hand_no,
            scores = %pretty::format_scores(&scores, use_color()),
            "hand settled"
        );
        for (&id, &score) in &scores {
            self.send_to(id, &Message::GameEnd { score }).await;
        }

        // Bankroll accounting feeds the hand log's money block.
        let starting_money = self.bankroll.clone();
        let starting_delta = self.delta.clone();
        for (&id, &score) in &scores {
            *self.bankroll.entry(id).or_default() += score;
            *self.delta.entry(id).or_default() += score;
        }

        let mut log = hand.hand_log();
        log["playerMoney"] = self.money_block(&starting_money, &starting_delta, &scores);
        let path = self
            .log_writer
            .write(&log, hand.hand_id(), hand.sequence())?;
        tracing::debug!(path = %path.display(), "hand log written");
        if let Some(results) = &self.results {
            results.append(hand_no, &scores)?;
        }
        Ok(())
    }

    /// The betting loop of one hand: solicit actors in positional order,
    /// advance streets when rounds complete, and stop at the hand's end or
    /// at the next safe shutdown boundary.
    async fn drive_betting(&mut self, hand: &mut Hand) -> Result<()> {
        loop {
            while !hand.is_round_complete() {
                if self.is_shutdown() {
                    break;
                }
                let Some(actor) = hand.next_actor() else {
                    break;
                };
                if hand.carried_all_in(actor) {
                    // Propagate the all-in without soliciting.
                    hand.apply(actor, Action::AllIn(0))?;
                    self.broadcast_state(hand).await;
                    continue;
                }
                if !self.connections.contains_key(&actor) {
                    hand.apply(actor, Action::Fold)?;
                    tracing::info!(player = %actor, "folded disconnected player");
                    self.broadcast_state(hand).await;
                    continue;
                }
                self.solicit(hand, actor).await?;
                if hand.active_players().len() <= 1 {
                    break;
                }
            }

            if hand.is_round_complete() {
                self.broadcast(&Message::RoundEnd {
                    round: hand.current_round().name().to_string(),
                })
                .await;
                hand.end_round()?;
                if hand.is_next_round() && !self.is_shutdown() {
                    hand.start_round()?;
                    tracing::info!(
                        round = hand.current_round().name(),
                        board = %pretty::format_cards(hand.board(), use_color()),
                        "round started"
                    );
                    self.broadcast(&Message::RoundStart {
                        round: hand.current_round().name().to_string(),
                    })
                    .await;
                    self.broadcast_state(hand).await;
                    continue;
                }
            } else if self.is_shutdown() {
                tracing::warn!("shutdown mid-round, settling early");
            }
            return Ok(());
        }
    }

    /// Ask one player for an action and apply the answer. The turn only
    /// advances on a successful application, a timeout fold, or the
    /// player's disconnection; protocol and legality errors re-solicit the
    /// same player.
    async fn solicit(&mut self, hand: &mut Hand, actor: PlayerId) -> Result<()> {
        let deadline = self.cfg.turn_timeout();
        loop {
            let request = Message::RequestAction(RequestActionMsg {
                player_id: actor,
                time_left: self.cfg.turn_timeout_secs,
            });
            if !self.send_to(actor, &request).await {
                hand.apply(actor, Action::Fold)?;
                self.broadcast_state(hand).await;
                return Ok(());
            }
            let Some(conn) = self.connections.get_mut(&actor) else {
                hand.apply(actor, Action::Fold)?;
                self.broadcast_state(hand).await;
                return Ok(());
            };

            match tokio::time::timeout(deadline, conn.recv()).await {
                Err(_elapsed) => {
                    // Turn expired: fold on the player's behalf and discard
                    // any late answer still in flight.
                    let _ = self
                        .send_to(actor, &Message::text("Timeout! You have been folded."))
                        .await;
                    if let Some(conn) = self.connections.get_mut(&actor) {
                        conn.drain().await;
                    }
                    hand.apply(actor, Action::Fold)?;
                    tracing::info!(player = %actor, "turn timed out, folded");
                    self.broadcast_state(hand).await;
                    return Ok(());
                }
                Ok(Err(err)) => {
                    tracing::warn!(player = %actor, error = %err, "transport error, removing player");
                    self.remove(actor).await;
                    hand.apply(actor, Action::Fold)?;
                    self.broadcast_state(hand).await;
                    return Ok(());
                }
                Ok(Ok(Received::Invalid(err))) => {
                    let _ = self
                        .send_to(
                            actor,
                            &Message::text(format!("Invalid action: {err}. Try again.")),
                        )
                        .await;
                }
                Ok(Ok(Received::Message(Message::PlayerAction(pa)))) => {
                    if pa.player_id != actor {
                        let _ = self
                            .send_to(
                                actor,
                                &Message::text("That action names another player. Try again."),
                            )
                            .await;
                        continue;
                    }
                    let Some(action) = Action::from_wire(pa.action, pa.amount) else {
                        let _ = self
                            .send_to(
                                actor,
                                &Message::text(format!(
                                    "Unknown action code {}. Try again.",
                                    pa.action
                                )),
                            )
                            .await;
                        continue;
                    };
                    match hand.apply(actor, action) {
                        Ok(()) => {
                            tracing::info!("{}", pretty::describe_action(actor, action));
                            self.broadcast_state(hand).await;
                            return Ok(());
                        }
                        Err(err) => {
                            let _ = self
                                .send_to(
                                    actor,
                                    &Message::text(format!("Invalid action: {err}. Try again.")),
                                )
                                .await;
                        }
                    }
                }
                Ok(Ok(Received::Message(_))) => {
                    let _ = self
                        .send_to(
                            actor,
                            &Message::text("Expected a player action. Try again."),
                        )
                        .await;
                }
            }
        }
    }

    fn money_block(
        &self,
        starting_money: &BTreeMap<PlayerId, i64>,
        starting_delta: &BTreeMap<PlayerId, i64>,
        scores: &BTreeMap<PlayerId, i64>,
    ) -> Value {
        fn by_id(map: &BTreeMap<PlayerId, i64>) -> Value {
            Value::Object(
                map.iter()
                    .map(|(p, v)| (p.to_string(), json!(v)))
                    .collect(),
            )
        }
        json!({
            "initialAmount": self.cfg.initial_chips,
            "startingMoney": by_id(starting_money),
            "startingDelta": by_id(starting_delta),
            "finalMoney": by_id(&self.bankroll),
            "finalDelta": by_id(&self.delta),
            "gameScores": by_id(scores),
            "thisGameDelta": by_id(scores),
        })
    }

    /// Send to one player; a write failure disconnects them. Returns whether
    /// the message went out.
    async fn send_to(&mut self, id: PlayerId, msg: &Message) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        match conn.send(msg).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(player = %id, error = %err, "write failed, removing player");
                self.remove(id).await;
                false
            }
        }
    }

    /// Best-effort broadcast; failing clients are dropped along the way.
    async fn broadcast(&mut self, msg: &Message) {
        let ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        for id in ids {
            self.send_to(id, msg).await;
        }
    }

    async fn broadcast_state(&mut self, hand: &Hand) {
        if let Some(gs) = hand.game_state() {
            self.broadcast(&Message::GameState(Box::new(gs))).await;
        }
    }

    async fn remove(&mut self, id: PlayerId) {
        if self.connections.remove(&id).is_some() {
            tracing::info!(player = %id, "player disconnected");
        }
    }

    async fn close_all(&mut self, reason: &str) {
        let ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        for id in ids {
            self.send_to(
                id,
                &Message::Disconnect {
                    reason: reason.to_string(),
                },
            )
            .await;
        }
        self.connections.clear();
    }
}

/// Resolve once the shutdown flag flips true; if the sender side is gone,
/// park forever so the select arms below never spin.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}
