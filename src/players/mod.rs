//! Player threads, their input queues and verdict channels.
//!
//! ## Key Types
//!
//! - `Player`: one player's shared state and thread entry points
//! - `PlayerKind`: human (external input) or computer (auto-play thread)
//! - `Verdict`: the dealer's answer to a submitted set
//! - `Shutdown`: cooperative termination signal
//!
//! A player blocks in exactly three places: waiting for a key press, waiting
//! for a verdict, and sleeping out a freeze. All three wake on `terminate`.

pub mod player;
pub mod shutdown;

pub use player::{KeyPress, Player, PlayerKind, Verdict};
pub use shutdown::Shutdown;
