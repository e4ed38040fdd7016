//! # rust-set
//!
//! A real-time, multi-threaded engine for the card game Set.
//!
//! ## Design Principles
//!
//! 1. **Real Threads**: Every player runs on its own thread, racing the others
//!    for the same cards. The dealer runs on one more thread and owns the
//!    round clock.
//!
//! 2. **One Table, One Lock**: The grid, its inverse index, the refill order
//!    and every player's marks change together under a single mutex.
//!
//! 3. **Nothing Hangs**: Every blocking point (key queue, verdict, freeze,
//!    dealer wait) wakes on termination.
//!
//! ## Architecture
//!
//! ```text
//!  input ──key_pressed──▶ Player ──Request──▶ Dealer
//!                           ▲  │                 │
//!                           │  └──mark/unmark──▶ Board ◀──deal/collect──┘
//!                           └──────Verdict───────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `core`: Player ids, cards and slots, configuration, RNG, errors
//! - `rules`: The set oracle
//! - `board`: The shared table and its lock
//! - `display`: Display sink trait, logging and recording sinks
//! - `players`: Player threads and their queues
//! - `dealer`: Round loop, request judging, winners
//! - `game`: Wiring and the running-game handle

pub mod core;
pub mod rules;
pub mod board;
pub mod display;
pub mod players;
pub mod dealer;
pub mod game;

// Re-export commonly used types
pub use crate::core::{
    PlayerId, PlayerMap,
    Card, Slot,
    GameConfig, GameRng,
    GameError, Result,
};

pub use crate::rules::{FeatureOracle, SetOracle};

pub use crate::board::{Board, Table, TableGuard};

pub use crate::display::{DisplayEvent, DisplaySink, RecordingSink, TracingSink};

pub use crate::players::{KeyPress, Player, PlayerKind, Shutdown, Verdict};

pub use crate::dealer::{winners, Dealer, GameSummary, Pick, Request};

pub use crate::game::{Game, GameHandle};
