//! The dealer thread.
//!
//! ## Key Types
//!
//! - `Dealer`: owns the deck, the round countdown and every player thread
//! - `Request`: a player's claim that its marked cards form a set
//! - `GameSummary`: winners and final scores
//!
//! Requests are judged one at a time, in arrival order.

pub mod engine;
pub mod request;

pub use engine::{winners, Dealer, GameSummary};
pub use request::{request_queue, Pick, Request};
