//! The dealer: round timing, set validation and player lifecycle.
//!
//! ## Game loop
//!
//! ```text
//! start players, shuffle deck
//! while a set remains among deck + table:
//!     deal -> [wait for request or tick -> judge -> deal]* until deadline -> collect table
//! announce winners, stop players
//! ```
//!
//! The dealer is the only thread that places or removes cards, and it does so
//! holding the table through `Board::lock_for_dealer`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::board::Board;
use crate::core::{Card, GameConfig, GameError, GameRng, PlayerId, PlayerMap, Result, Slot};
use crate::display::DisplaySink;
use crate::players::{Player, Shutdown, Verdict};
use crate::rules::SetOracle;

use super::request::Request;

/// Wait between countdown refreshes outside the warning window.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Wait between countdown refreshes inside the warning window.
const URGENT_TICK: Duration = Duration::from_millis(10);

/// Final result of a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Every player sharing the top score, in id order.
    pub winners: Vec<PlayerId>,
    /// Final score of each player.
    pub scores: PlayerMap<u32>,
}

/// Players sharing the highest score, in id order.
///
/// ```
/// use rust_set::core::{PlayerId, PlayerMap};
/// use rust_set::dealer::winners;
///
/// let scores: PlayerMap<u32> = vec![2, 5, 5].into_iter().collect();
/// assert_eq!(winners(&scores), vec![PlayerId(1), PlayerId(2)]);
/// ```
#[must_use]
pub fn winners(scores: &PlayerMap<u32>) -> Vec<PlayerId> {
    let best = scores.values().copied().max().unwrap_or(0);
    scores
        .iter()
        .filter(|(_, &score)| score == best)
        .map(|(player, _)| player)
        .collect()
}

/// The dealer.
pub struct Dealer {
    config: Arc<GameConfig>,
    board: Arc<Board>,
    players: Vec<Arc<Player>>,
    display: Arc<dyn DisplaySink>,
    oracle: Arc<dyn SetOracle>,
    requests: Receiver<Request>,
    /// Requests taken off the queue but not yet judged.
    backlog: VecDeque<Request>,
    /// Dealt from the front.
    deck: VecDeque<Card>,
    rng: GameRng,
    shuffler: GameRng,
    /// `None` until the first deal.
    reshuffle_at: Option<Instant>,
    finished: bool,
    shutdown: Arc<Shutdown>,
    handles: Vec<(PlayerId, JoinHandle<()>)>,
}

impl Dealer {
    /// Create a dealer with the full deck in id order.
    pub fn new(
        config: Arc<GameConfig>,
        board: Arc<Board>,
        players: Vec<Arc<Player>>,
        display: Arc<dyn DisplaySink>,
        oracle: Arc<dyn SetOracle>,
        requests: Receiver<Request>,
        rng: GameRng,
    ) -> Self {
        let deck = Card::deck(config.deck_size).collect();
        let shuffler = rng.for_context("deck");
        Self {
            config,
            board,
            players,
            display,
            oracle,
            requests,
            backlog: VecDeque::new(),
            deck,
            rng,
            shuffler,
            reshuffle_at: None,
            finished: false,
            shutdown: Arc::new(Shutdown::new()),
            handles: Vec::new(),
        }
    }

    /// Replace the deck. Cards are dealt in the given order until the first
    /// shuffle.
    #[must_use]
    pub fn with_deck(mut self, deck: impl IntoIterator<Item = Card>) -> Self {
        self.deck = deck.into_iter().collect();
        self
    }

    /// Signal that stops the game loop when triggered from any thread.
    #[must_use]
    pub fn shutdown_signal(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Stop the game loop.
    pub fn terminate(&self) {
        self.shutdown.trigger();
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Whether the last set has been collected.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Cards not on the table, in dealing order.
    #[must_use]
    pub fn deck(&self) -> Vec<Card> {
        self.deck.iter().copied().collect()
    }

    #[must_use]
    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    #[must_use]
    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    /// Requests submitted but not yet judged or voided.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.backlog.len() + self.requests.len()
    }

    /// When the current round ends, once a deal has happened.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.reshuffle_at
    }

    // === Game loop ===

    /// Run a whole game on the current thread.
    pub fn run(mut self) -> Result<GameSummary> {
        info!(players = self.players.len(), deck = self.deck.len(), "dealer starting");

        if let Err(err) = self.start_players() {
            self.terminate_players()?;
            return Err(err);
        }
        self.shuffle_deck();

        while !self.should_finish() {
            self.run_round();
        }

        let summary = self.announce_winners();
        self.terminate_players()?;
        info!(winners = ?summary.winners, "dealer terminated");
        Ok(summary)
    }

    /// Start every player thread, each with its own RNG fork.
    pub fn start_players(&mut self) -> Result<()> {
        for player in &self.players {
            let handle = player.start(self.rng.fork())?;
            self.handles.push((player.id(), handle));
        }
        Ok(())
    }

    /// Stop started players in reverse order, joining each.
    pub fn terminate_players(&mut self) -> Result<()> {
        let mut first_panic = None;
        while let Some((id, handle)) = self.handles.pop() {
            self.players[id.index()].terminate();
            if handle.join().is_err() {
                error!(player = id.0, "player thread panicked");
                first_panic.get_or_insert(id);
            }
        }
        match first_panic {
            Some(id) => Err(GameError::ThreadPanicked(format!("player-{}", id.0))),
            None => Ok(()),
        }
    }

    /// One round: deal, play until the deadline, collect the table.
    pub fn run_round(&mut self) {
        self.place_cards_on_table();
        self.timer_loop();
        self.update_timer_display(false);
        self.remove_all_cards_from_table();
    }

    fn timer_loop(&mut self) {
        while !self.is_terminated() && !self.finished && !self.deadline_passed() {
            let request = self.next_request();
            self.update_timer_display(false);
            if let Some(request) = request {
                self.process_request(request);
            }
            self.place_cards_on_table();
            if self.round_exhausted() {
                debug!("no set left on the table and the deck is empty");
                break;
            }
        }
    }

    fn should_finish(&self) -> bool {
        if self.is_terminated() || self.finished {
            return true;
        }
        let mut cards: Vec<Card> = self.deck.iter().copied().collect();
        cards.extend(self.board.lock().cards());
        !self.oracle.has_any_set(&cards)
    }

    fn round_exhausted(&self) -> bool {
        self.deck.is_empty() && !self.oracle.has_any_set(&self.board.lock().cards())
    }

    fn deadline_passed(&self) -> bool {
        self.reshuffle_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    // === Waiting ===

    /// Take the next request, waiting at most one countdown tick for it.
    ///
    /// The tick shrinks inside the warning window so the countdown stays
    /// fresh, and never runs past the deadline.
    pub fn next_request(&mut self) -> Option<Request> {
        if let Some(request) = self.backlog.pop_front() {
            return Some(request);
        }
        if let Ok(request) = self.requests.try_recv() {
            return Some(request);
        }

        let wait = self.wait_interval();
        select! {
            recv(self.requests) -> request => request.ok(),
            recv(self.shutdown.signal()) -> _ => None,
            default(wait) => None,
        }
    }

    fn wait_interval(&self) -> Duration {
        let Some(deadline) = self.reshuffle_at else {
            return IDLE_TICK;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        let tick = if remaining <= self.config.turn_timeout_warning() {
            URGENT_TICK
        } else {
            IDLE_TICK
        };
        tick.min(remaining)
    }

    // === Table changes ===

    /// Fill empty slots from the deck. Restarts the countdown if anything
    /// was dealt.
    ///
    /// Leaves the table unlocked when there is nothing to deal or nowhere to
    /// put it.
    pub fn place_cards_on_table(&mut self) {
        if self.deck.is_empty() || !self.board.has_open_slot() {
            return;
        }
        let board = Arc::clone(&self.board);
        let mut table = board.lock_for_dealer();
        let mut dealt = 0;
        while !self.deck.is_empty() {
            let Some(slot) = table.pop_open_slot() else {
                break;
            };
            if let Some(card) = self.deck.pop_front() {
                table.place_card(card, slot);
                dealt += 1;
            }
        }
        if dealt == 0 {
            return;
        }

        let hints = self.config.hints.then(|| {
            let on_table: Vec<(Slot, Card)> = table.occupied().collect();
            let cards: Vec<Card> = on_table.iter().map(|&(_, card)| card).collect();
            self.oracle
                .find_sets(&cards, usize::MAX)
                .into_iter()
                .map(|set| {
                    set.iter()
                        .filter_map(|card| table.slot_of(*card))
                        .collect::<Vec<Slot>>()
                })
                .collect::<Vec<_>>()
        });
        drop(table);

        debug!(dealt, deck = self.deck.len(), "cards dealt");
        self.update_timer_display(true);
        if let Some(sets) = hints {
            self.display.show_hint(&sets);
        }
    }

    /// Judge one request.
    ///
    /// A request naming any card that has left its slot is void and its
    /// player is released without a verdict. Otherwise the oracle decides:
    /// a set is removed from the table along with every mark on it, the
    /// point is credited before the player hears back, and other queued
    /// requests naming those cards are voided.
    pub fn process_request(&mut self, request: Request) {
        let Some(player) = self.players.get(request.player.index()).cloned() else {
            warn!(player = request.player.0, "request from unknown player");
            return;
        };

        let board = Arc::clone(&self.board);
        let mut table = board.lock_for_dealer();
        let current = request.picks.iter().all(|pick| {
            table.card_at(pick.slot) == Some(pick.card) && board.epoch(pick.slot) == pick.epoch
        });
        if !current {
            drop(table);
            debug!(player = request.player.0, "stale request voided");
            player.deliver(Verdict::Void);
            return;
        }

        let cards = request.cards();
        let verdict = if self.oracle.is_valid_set(&cards) {
            self.void_requests_naming(&cards);
            for pick in &request.picks {
                table.clear_marks_on(pick.slot);
                table.remove_card(pick.slot);
            }
            table.shuffle_open_slots(&mut self.shuffler);
            if self.deck.is_empty() && table.card_count() == 0 {
                self.finished = true;
            }
            Verdict::Point
        } else {
            Verdict::Penalty
        };
        drop(table);

        debug!(player = request.player.0, ?cards, ?verdict, "request judged");
        if verdict == Verdict::Point {
            player.award_point();
        }
        player.deliver(verdict);
    }

    /// Void every waiting request that names one of `cards`.
    fn void_requests_naming(&mut self, cards: &[Card]) {
        self.backlog.extend(self.requests.try_iter());
        let players = &self.players;
        self.backlog.retain(|request| {
            if !request.references_any(cards) {
                return true;
            }
            debug!(player = request.player.0, "overlapping request voided");
            if let Some(player) = players.get(request.player.index()) {
                player.deliver(Verdict::Void);
            }
            false
        });
    }

    /// Void every waiting request.
    fn void_all_requests(&mut self) {
        self.backlog.extend(self.requests.try_iter());
        for request in self.backlog.drain(..) {
            if let Some(player) = self.players.get(request.player.index()) {
                player.deliver(Verdict::Void);
            }
        }
    }

    /// End of round: clear every mark, return every card to the deck, void
    /// pending requests, and shuffle the deck and the refill order.
    pub fn remove_all_cards_from_table(&mut self) {
        let board = Arc::clone(&self.board);
        let mut table = board.lock_for_dealer();
        table.clear_all_marks();
        let occupied: Vec<Slot> = table.occupied().map(|(slot, _)| slot).collect();
        for slot in occupied {
            if let Some(card) = table.remove_card(slot) {
                self.deck.push_back(card);
            }
        }
        table.shuffle_open_slots(&mut self.shuffler);
        self.void_all_requests();
        drop(table);

        self.shuffle_deck();
        info!(deck = self.deck.len(), "table collected");
    }

    fn shuffle_deck(&mut self) {
        self.shuffler.shuffle(self.deck.make_contiguous());
    }

    // === Display ===

    /// Refresh the countdown, or restart it when `reset`.
    pub fn update_timer_display(&mut self, reset: bool) {
        let timeout = self.config.turn_timeout();
        if reset {
            self.reshuffle_at = Some(Instant::now() + timeout);
            self.display.set_countdown(timeout, false);
            return;
        }

        let Some(deadline) = self.reshuffle_at else {
            return;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.display
            .set_countdown(remaining, remaining <= self.config.turn_timeout_warning());
    }

    /// Report and return the final standings.
    pub fn announce_winners(&self) -> GameSummary {
        let scores: PlayerMap<u32> = self.players.iter().map(|p| p.score()).collect();
        let winners = winners(&scores);
        self.display.announce_winners(&winners);
        GameSummary { winners, scores }
    }
}

impl std::fmt::Debug for Dealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dealer")
            .field("players", &self.players.len())
            .field("deck", &self.deck.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for Dealer {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.terminate_players();
        }
    }
}
