//! Host surface: wire a board, players and a dealer together and run them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_set::core::{GameConfig, PlayerId, Slot};
//! use rust_set::display::TracingSink;
//! use rust_set::game::Game;
//! use rust_set::rules::FeatureOracle;
//!
//! let config = GameConfig::new().with_players(1, 1);
//! let oracle = Arc::new(FeatureOracle::new(config.set_size, config.feature_count));
//! let game = Game::new(config, oracle, Arc::new(TracingSink), 7)?;
//!
//! let handle = game.start()?;
//! handle.key_pressed(PlayerId(0), Slot(4));
//! handle.terminate();
//! let summary = handle.join()?;
//! println!("winners: {:?}", summary.winners);
//! # Ok::<(), rust_set::core::GameError>(())
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::board::Board;
use crate::core::{Card, GameConfig, GameError, GameRng, PlayerId, Result, Slot};
use crate::dealer::{request_queue, Dealer, GameSummary};
use crate::display::DisplaySink;
use crate::players::{Player, PlayerKind, Shutdown};
use crate::rules::SetOracle;

/// A game that has not started yet.
///
/// Human players take the lowest ids, computer players follow.
#[derive(Debug)]
pub struct Game {
    board: Arc<Board>,
    players: Vec<Arc<Player>>,
    dealer: Dealer,
}

impl Game {
    /// Validate `config` and build every component. No thread runs yet.
    pub fn new(
        config: GameConfig,
        oracle: Arc<dyn SetOracle>,
        display: Arc<dyn DisplaySink>,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if oracle.set_size() != config.set_size {
            return Err(GameError::InvalidConfig(format!(
                "oracle judges sets of {} cards but set_size is {}",
                oracle.set_size(),
                config.set_size
            )));
        }

        let config = Arc::new(config);
        let board = Arc::new(Board::new(&config, Arc::clone(&display)));
        let (requests_tx, requests_rx) = request_queue(config.player_count());

        let players: Vec<Arc<Player>> = PlayerId::all(config.player_count())
            .map(|id| {
                let kind = if id.index() < config.human_players {
                    PlayerKind::Human
                } else {
                    PlayerKind::Computer
                };
                Arc::new(Player::new(
                    id,
                    kind,
                    Arc::clone(&config),
                    Arc::clone(&board),
                    Arc::clone(&display),
                    requests_tx.clone(),
                ))
            })
            .collect();

        let dealer = Dealer::new(
            config,
            Arc::clone(&board),
            players.clone(),
            display,
            oracle,
            requests_rx,
            GameRng::new(seed),
        );

        Ok(Self {
            board,
            players,
            dealer,
        })
    }

    /// Replace the deck. See `Dealer::with_deck`.
    #[must_use]
    pub fn with_deck(mut self, deck: impl IntoIterator<Item = Card>) -> Self {
        self.dealer = self.dealer.with_deck(deck);
        self
    }

    #[must_use]
    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    #[must_use]
    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    /// Take the dealer out to drive it step by step.
    #[must_use]
    pub fn into_dealer(self) -> Dealer {
        self.dealer
    }

    /// Run the whole game on the current thread.
    pub fn run(self) -> Result<GameSummary> {
        self.dealer.run()
    }

    /// Run the game on a `dealer` thread.
    pub fn start(self) -> Result<GameHandle> {
        let shutdown = self.dealer.shutdown_signal();
        let dealer = self.dealer;
        let handle = thread::Builder::new()
            .name("dealer".to_owned())
            .spawn(move || dealer.run())?;
        info!(players = self.players.len(), "game started");

        Ok(GameHandle {
            board: self.board,
            players: self.players,
            shutdown,
            handle,
        })
    }
}

/// A running game.
#[derive(Debug)]
pub struct GameHandle {
    board: Arc<Board>,
    players: Vec<Arc<Player>>,
    shutdown: Arc<Shutdown>,
    handle: JoinHandle<Result<GameSummary>>,
}

impl GameHandle {
    /// Forward a key press to a player. Best-effort, see `Player::key_pressed`.
    pub fn key_pressed(&self, player: PlayerId, slot: Slot) -> bool {
        self.player(player)
            .is_some_and(|p| p.key_pressed(slot))
    }

    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<&Arc<Player>> {
        self.players.get(player.index())
    }

    #[must_use]
    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    #[must_use]
    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    /// Whether the dealer thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the game. The dealer still reports the standings at that point.
    pub fn terminate(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the dealer thread and return the final standings.
    pub fn join(self) -> Result<GameSummary> {
        self.handle
            .join()
            .map_err(|_| GameError::ThreadPanicked("dealer".to_owned()))?
    }
}
