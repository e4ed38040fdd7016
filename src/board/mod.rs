//! The shared board.
//!
//! ## Key Types
//!
//! - `Table`: grid, card index, open slots and per-player marks
//! - `Board`: the table behind one coarse mutex, plus lock-free signals
//! - `TableGuard`: scoped access; the only way to mutate the table
//!
//! One lock covers the whole table: a dealer reshuffle and a player's
//! marking never run at the same time.

pub mod table;
pub mod shared;

pub use table::{Marks, Table};
pub use shared::{Board, TableGuard};
