//! Core types shared by every thread: ids, configuration, RNG, errors.
//!
//! Nothing in here knows about threads. The board, players and dealer build
//! on these types.

pub mod player;
pub mod card;
pub mod config;
pub mod rng;
pub mod error;

pub use player::{PlayerId, PlayerMap};
pub use card::{Card, Slot};
pub use config::GameConfig;
pub use rng::GameRng;
pub use error::{GameError, Result};
