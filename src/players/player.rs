//! Player threads.
//!
//! Each player runs one thread that consumes key presses from a bounded
//! input queue, marks and unmarks slots under the table lock, and submits a
//! `Request` when its row of marks fills. It then blocks until the dealer
//! answers on the player's single-slot verdict channel.
//!
//! ## States
//!
//! ```text
//! Idle --press--> Marking --row full--> AwaitingVerdict --verdict--> Frozen --> Idle
//!                    |
//!                    +-- stale / cancel / row not full --> Idle
//! ```
//!
//! Computer players also run an auto-play thread that feeds random presses
//! into the same input queue. The player thread joins it before exiting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, error, info, trace, warn};

use crate::board::Board;
use crate::core::{GameConfig, GameRng, PlayerId, Result, Slot};
use crate::dealer::{Pick, Request};
use crate::display::DisplaySink;

use super::shutdown::Shutdown;

/// Freeze countdowns are reported at this granularity.
const FREEZE_TICK: Duration = Duration::from_secs(1);

/// Who produces a player's key presses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    /// Presses arrive from outside through `Player::key_pressed`.
    Human,
    /// Presses come from the player's own auto-play thread.
    Computer,
}

/// The dealer's answer to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The request was discarded: a card left the table, or the round ended.
    Void,
    /// The cards formed a set and were taken off the table.
    Point,
    /// The cards did not form a set.
    Penalty,
}

/// A buffered key press.
///
/// Remembers how many times the slot had been emptied when the key was
/// pressed. If the slot has been emptied since, the press targeted a card
/// that is gone and is dropped instead of landing on its replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub slot: Slot,
    epoch: u64,
}

/// One player: shared handle used by its threads, the dealer and the host.
pub struct Player {
    id: PlayerId,
    kind: PlayerKind,
    config: Arc<GameConfig>,
    board: Arc<Board>,
    display: Arc<dyn DisplaySink>,
    requests: Sender<Request>,
    input_tx: Sender<KeyPress>,
    input_rx: Receiver<KeyPress>,
    verdict_tx: Sender<Verdict>,
    verdict_rx: Receiver<Verdict>,
    score: AtomicU32,
    shutdown: Shutdown,
}

impl Player {
    /// Create a player. No thread runs until `start`.
    pub fn new(
        id: PlayerId,
        kind: PlayerKind,
        config: Arc<GameConfig>,
        board: Arc<Board>,
        display: Arc<dyn DisplaySink>,
        requests: Sender<Request>,
    ) -> Self {
        let (input_tx, input_rx) = bounded(config.set_size);
        let (verdict_tx, verdict_rx) = bounded(1);
        Self {
            id,
            kind,
            config,
            board,
            display,
            requests,
            input_tx,
            input_rx,
            verdict_tx,
            verdict_rx,
            score: AtomicU32::new(0),
            shutdown: Shutdown::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    /// Current score. Never decreases.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score.load(Ordering::Acquire)
    }

    /// Whether `terminate` has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Queue a key press without blocking.
    ///
    /// Returns `false` if the press was not queued: the input queue is full,
    /// the slot is off the table, or the player is terminating. Delivery is
    /// best-effort; a queued press can still be dropped later if the dealer
    /// is dealing when it is consumed.
    pub fn key_pressed(&self, slot: Slot) -> bool {
        if slot.index() >= self.board.size() || self.is_terminated() {
            return false;
        }
        match self.input_tx.try_send(self.press(slot)) {
            Ok(()) => {
                trace!(player = self.id.0, slot = slot.0, "key queued");
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queue a key press, waiting for room. Returns `false` on termination.
    pub fn press_blocking(&self, slot: Slot) -> bool {
        if slot.index() >= self.board.size() {
            return false;
        }
        let press = self.press(slot);
        select! {
            send(self.input_tx, press) -> sent => sent.is_ok(),
            recv(self.shutdown.signal()) -> _ => false,
        }
    }

    fn press(&self, slot: Slot) -> KeyPress {
        KeyPress {
            slot,
            epoch: self.board.epoch(slot),
        }
    }

    /// Credit one point and show the new score. Called by the dealer before
    /// it delivers `Verdict::Point`, so the score never depends on the player
    /// thread getting to the verdict.
    pub fn award_point(&self) -> u32 {
        let score = self.score.fetch_add(1, Ordering::AcqRel) + 1;
        self.display.set_score(self.id, score);
        score
    }

    /// Hand the player its verdict. Called by the dealer.
    pub fn deliver(&self, verdict: Verdict) {
        if let Err(err) = self.verdict_tx.try_send(verdict) {
            warn!(player = self.id.0, ?verdict, %err, "verdict not delivered");
        }
    }

    /// Start the player thread. A computer player's thread also starts its
    /// auto-play thread, seeded from `rng`.
    pub fn start(self: &Arc<Self>, rng: GameRng) -> Result<JoinHandle<()>> {
        let player = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("player-{}", self.id.0))
            .spawn(move || player.run(rng))?;
        Ok(handle)
    }

    /// Ask the player's threads to stop. The caller joins the handle from
    /// `start` to wait for them.
    pub fn terminate(&self) {
        self.shutdown.trigger();
    }

    // === Player thread ===

    fn run(self: Arc<Self>, rng: GameRng) {
        info!(player = self.id.0, kind = ?self.kind, "player thread starting");

        let auto_play = match self.kind {
            PlayerKind::Computer => self.spawn_auto_play(rng),
            PlayerKind::Human => None,
        };

        while !self.shutdown.is_triggered() {
            let press = select! {
                recv(self.input_rx) -> press => match press {
                    Ok(press) => press,
                    Err(_) => break,
                },
                recv(self.shutdown.signal()) -> _ => break,
            };

            let Some(request) = self.act(press) else {
                continue;
            };
            match self.submit(request) {
                Some(verdict) => self.apply(verdict),
                None => break,
            }
        }

        if let Some(handle) = auto_play {
            if handle.join().is_err() {
                error!(player = self.id.0, "auto-play thread panicked");
            }
        }
        info!(player = self.id.0, score = self.score(), "player thread terminated");
    }

    fn spawn_auto_play(self: &Arc<Self>, mut rng: GameRng) -> Option<JoinHandle<()>> {
        let player = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("computer-{}", self.id.0))
            .spawn(move || {
                debug!(player = player.id.0, "auto-play starting");
                let slots = player.board.size();
                while !player.shutdown.is_triggered() {
                    let slot = Slot(rng.gen_range_usize(0..slots) as u16);
                    if !player.press_blocking(slot) {
                        break;
                    }
                }
                debug!(player = player.id.0, "auto-play terminated");
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(player = self.id.0, %err, "failed to spawn auto-play thread");
                None
            }
        }
    }

    /// Apply one key press under the table lock. Returns a request when the
    /// press completes a row.
    ///
    /// A penalized row stays full and a full row takes no new marks, so it is
    /// judged again only after one of its marks is removed and a slot marked.
    fn act(&self, press: KeyPress) -> Option<Request> {
        if self.board.is_dealing() {
            trace!(player = self.id.0, slot = press.slot.0, "press dropped while dealing");
            return None;
        }

        let mut table = self.board.lock();
        if self.board.epoch(press.slot) != press.epoch || table.card_at(press.slot).is_none() {
            trace!(player = self.id.0, slot = press.slot.0, "stale press dropped");
            return None;
        }

        if table.unmark(self.id, press.slot) || !table.mark(self.id, press.slot) {
            return None;
        }
        if !table.is_full(self.id) {
            return None;
        }
        let picks: Option<SmallVec<[Pick; 4]>> = table
            .marks(self.id)
            .iter()
            .map(|&slot| {
                table
                    .card_at(slot)
                    .map(|card| Pick::new(slot, card, self.board.epoch(slot)))
            })
            .collect();
        Some(Request::new(self.id, picks?))
    }

    /// Send a request and wait for its verdict. `None` on termination.
    fn submit(&self, request: Request) -> Option<Verdict> {
        debug!(player = self.id.0, cards = ?request.cards(), "submitting set");
        select! {
            send(self.requests, request) -> sent => sent.ok()?,
            recv(self.shutdown.signal()) -> _ => return None,
        }
        select! {
            recv(self.verdict_rx) -> verdict => verdict.ok(),
            recv(self.shutdown.signal()) -> _ => None,
        }
    }

    fn apply(&self, verdict: Verdict) {
        debug!(player = self.id.0, ?verdict, "verdict received");
        match verdict {
            Verdict::Void => {}
            Verdict::Point => self.freeze(self.config.point_freeze()),
            Verdict::Penalty => self.freeze(self.config.penalty_freeze()),
        }
    }

    /// Sleep out a freeze, reporting the remaining time each tick. Presses
    /// keep buffering meanwhile.
    fn freeze(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.display.set_freeze(self.id, remaining);
            let step = remaining.min(FREEZE_TICK);
            if !self.shutdown.sleep(step) {
                break;
            }
            remaining -= step;
        }
        self.display.set_freeze(self.id, Duration::ZERO);
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("score", &self.score())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Card;
    use crate::dealer::request_queue;
    use crate::display::{DisplayEvent, RecordingSink};
    use std::time::Instant;

    struct Fixture {
        board: Arc<Board>,
        sink: Arc<RecordingSink>,
        requests: Receiver<Request>,
        player: Arc<Player>,
    }

    fn fixture(kind: PlayerKind) -> Fixture {
        let config = Arc::new(
            GameConfig::new()
                .with_players(1, 0)
                .with_freezes(Duration::from_millis(5), Duration::from_millis(5)),
        );
        let sink = Arc::new(RecordingSink::new());
        let board = Arc::new(Board::new(&config, sink.clone()));
        let (tx, rx) = request_queue(1);
        let player = Arc::new(Player::new(PlayerId(0), kind, config, board.clone(), sink.clone(), tx));
        Fixture {
            board,
            sink,
            requests: rx,
            player,
        }
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_key_pressed_respects_capacity() {
        let f = fixture(PlayerKind::Human);
        assert!(f.player.key_pressed(Slot(0)));
        assert!(f.player.key_pressed(Slot(1)));
        assert!(f.player.key_pressed(Slot(2)));
        assert!(!f.player.key_pressed(Slot(3)));
        assert!(!f.player.key_pressed(Slot(99)));
    }

    #[test]
    fn test_terminated_player_rejects_presses() {
        let f = fixture(PlayerKind::Human);
        f.player.terminate();
        assert!(f.player.is_terminated());
        assert!(!f.player.key_pressed(Slot(0)));
        assert!(!f.player.press_blocking(Slot(0)));
    }

    #[test]
    fn test_act_marks_and_cancels() {
        let f = fixture(PlayerKind::Human);
        f.board.lock().place_card(Card(0), Slot(0));
        let before = f.board.snapshot();

        assert!(f.player.act(f.player.press(Slot(0))).is_none());
        assert_eq!(f.board.marks(PlayerId(0)), vec![Slot(0)]);

        assert!(f.player.act(f.player.press(Slot(0))).is_none());
        assert!(f.board.marks(PlayerId(0)).is_empty());

        // Mark then cancel leaves the table as it was and sends nothing
        let after = f.board.snapshot();
        assert_eq!(after.cards(), before.cards());
        assert_eq!(after.open_slots().collect::<Vec<_>>(), before.open_slots().collect::<Vec<_>>());
        assert_eq!(f.board.epoch(Slot(0)), 0);
        assert!(f.requests.try_recv().is_err());
    }

    #[test]
    fn test_act_drops_empty_and_stale_slots() {
        let f = fixture(PlayerKind::Human);

        // Empty slot
        assert!(f.player.act(f.player.press(Slot(4))).is_none());
        assert!(f.board.marks(PlayerId(0)).is_empty());

        // Pressed before the card was replaced
        f.board.lock().place_card(Card(1), Slot(4));
        let press = f.player.press(Slot(4));
        f.board.lock().remove_card(Slot(4));
        f.board.lock().place_card(Card(2), Slot(4));
        assert!(f.player.act(press).is_none());
        assert!(f.board.marks(PlayerId(0)).is_empty());
    }

    #[test]
    fn test_act_drops_while_dealing() {
        let f = fixture(PlayerKind::Human);
        f.board.lock().place_card(Card(1), Slot(1));
        let press = f.player.press(Slot(1));

        let player = Arc::clone(&f.player);
        let guard = f.board.lock_for_dealer();
        let result = thread::spawn(move || player.act(press)).join().unwrap();
        drop(guard);

        assert!(result.is_none());
        assert!(f.board.marks(PlayerId(0)).is_empty());
    }

    #[test]
    fn test_full_row_builds_request() {
        let f = fixture(PlayerKind::Human);
        for i in 0..3 {
            f.board.lock().place_card(Card(i), Slot(i as u16 * 2));
        }

        assert!(f.player.act(f.player.press(Slot(0))).is_none());
        assert!(f.player.act(f.player.press(Slot(2))).is_none());
        let request = f.player.act(f.player.press(Slot(4))).unwrap();

        assert_eq!(request.player, PlayerId(0));
        assert_eq!(request.cards().as_slice(), &[Card(0), Card(1), Card(2)]);
        assert_eq!(request.picks[1], Pick::new(Slot(2), Card(1), 0));
        assert!(f.board.is_full(PlayerId(0)));
    }

    #[test]
    fn test_extra_press_on_full_row_is_ignored() {
        let f = fixture(PlayerKind::Human);
        for i in 0..4 {
            f.board.lock().place_card(Card(i), Slot(i as u16));
        }
        for slot in 0..3 {
            f.player.act(f.player.press(Slot(slot)));
        }

        // A fourth card adds nothing to a full row
        assert!(f.player.act(f.player.press(Slot(3))).is_none());
        assert_eq!(f.board.marks(PlayerId(0)), vec![Slot(0), Slot(1), Slot(2)]);

        // Dropping a mark and adding one forms a fresh row
        assert!(f.player.act(f.player.press(Slot(1))).is_none());
        let request = f.player.act(f.player.press(Slot(3))).unwrap();
        assert_eq!(request.cards().as_slice(), &[Card(0), Card(2), Card(3)]);
    }

    #[test]
    fn test_thread_submits_and_scores() {
        let f = fixture(PlayerKind::Human);
        for (i, slot) in [2u16, 5, 9].into_iter().enumerate() {
            f.board.lock().place_card(Card(i as u32), Slot(slot));
        }
        let handle = f.player.start(GameRng::new(1)).unwrap();

        for slot in [2u16, 5, 9] {
            assert!(f.player.key_pressed(Slot(slot)));
        }
        let request = f.requests.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(request.cards().as_slice(), &[Card(0), Card(1), Card(2)]);

        assert_eq!(f.player.award_point(), 1);
        f.player.deliver(Verdict::Point);
        assert_eq!(f.player.score(), 1);
        assert!(wait_for(|| {
            f.sink.count(|e| *e == DisplayEvent::Freeze { player: PlayerId(0), remaining: Duration::ZERO }) == 1
        }));

        f.player.terminate();
        handle.join().unwrap();
        assert_eq!(
            f.sink.count(|e| *e == DisplayEvent::Score { player: PlayerId(0), score: 1 }),
            1
        );
    }

    #[test]
    fn test_awarded_point_survives_terminate() {
        let f = fixture(PlayerKind::Human);
        for i in 0..3u16 {
            f.board.lock().place_card(Card(u32::from(i)), Slot(i));
        }
        let handle = f.player.start(GameRng::new(1)).unwrap();
        for i in 0..3u16 {
            f.player.key_pressed(Slot(i));
        }
        assert!(f.requests.recv_timeout(Duration::from_secs(5)).is_ok());

        // Terminate before the player thread can read the verdict
        f.player.award_point();
        f.player.deliver(Verdict::Point);
        f.player.terminate();
        handle.join().unwrap();

        assert_eq!(f.player.score(), 1);
        assert_eq!(
            f.sink.count(|e| *e == DisplayEvent::Score { player: PlayerId(0), score: 1 }),
            1
        );
    }

    #[test]
    fn test_one_request_outstanding_until_verdict() {
        let f = fixture(PlayerKind::Computer);
        for i in 0..12u16 {
            f.board.lock().place_card(Card(u32::from(i)), Slot(i));
        }
        let handle = f.player.start(GameRng::new(4)).unwrap();

        assert!(f.requests.recv_timeout(Duration::from_secs(5)).is_ok());
        // Auto-play keeps pressing, but nothing more is submitted unanswered
        thread::sleep(Duration::from_millis(200));
        assert!(f.requests.try_recv().is_err());

        f.player.deliver(Verdict::Void);
        assert!(f.requests.recv_timeout(Duration::from_secs(5)).is_ok());

        f.player.terminate();
        handle.join().unwrap();
    }

    #[test]
    fn test_terminate_wakes_player_awaiting_verdict() {
        let f = fixture(PlayerKind::Human);
        for i in 0..3u16 {
            f.board.lock().place_card(Card(u32::from(i)), Slot(i));
        }
        let handle = f.player.start(GameRng::new(1)).unwrap();
        for i in 0..3u16 {
            f.player.key_pressed(Slot(i));
        }
        assert!(f.requests.recv_timeout(Duration::from_secs(5)).is_ok());

        f.player.terminate();
        handle.join().unwrap();
        assert_eq!(f.player.score(), 0);
    }

    #[test]
    fn test_computer_player_stops_with_auto_play() {
        let f = fixture(PlayerKind::Computer);
        for i in 0..12u16 {
            f.board.lock().place_card(Card(u32::from(i)), Slot(i));
        }
        let handle = f.player.start(GameRng::new(9)).unwrap();

        // Auto-play eventually fills a row and submits
        assert!(f.requests.recv_timeout(Duration::from_secs(5)).is_ok());

        f.player.terminate();
        handle.join().unwrap();
    }
}
