//! Display sink trait and the logging implementation.

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::core::{Card, PlayerId, Slot};

/// Receives every user-visible change.
///
/// Called from the dealer thread and from player threads, sometimes while
/// the table lock is held, so implementations must be quick and must not
/// call back into the engine.
pub trait DisplaySink: Send + Sync {
    /// A card was dealt into a slot.
    fn place_card(&self, card: Card, slot: Slot);

    /// A slot was emptied.
    fn remove_card(&self, slot: Slot);

    /// A player marked a slot.
    fn place_token(&self, player: PlayerId, slot: Slot);

    /// A player's mark on a slot disappeared.
    fn remove_token(&self, player: PlayerId, slot: Slot);

    /// Every mark on the table was cleared.
    fn remove_tokens(&self);

    /// Time left in the round. `urgent` inside the warning window.
    fn set_countdown(&self, remaining: Duration, urgent: bool);

    /// A player's score changed.
    fn set_score(&self, player: PlayerId, score: u32);

    /// Time left in a player's freeze. Zero when the freeze ends.
    fn set_freeze(&self, player: PlayerId, remaining: Duration);

    /// The game ended with these winners.
    fn announce_winners(&self, winners: &[PlayerId]);

    /// Sets currently on the table, by slot.
    fn show_hint(&self, _sets: &[Vec<Slot>]) {}
}

/// Logs every display event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn place_card(&self, card: Card, slot: Slot) {
        trace!(card = card.raw(), slot = slot.0, "card placed");
    }

    fn remove_card(&self, slot: Slot) {
        trace!(slot = slot.0, "card removed");
    }

    fn place_token(&self, player: PlayerId, slot: Slot) {
        trace!(player = player.0, slot = slot.0, "token placed");
    }

    fn remove_token(&self, player: PlayerId, slot: Slot) {
        trace!(player = player.0, slot = slot.0, "token removed");
    }

    fn remove_tokens(&self) {
        trace!("all tokens removed");
    }

    fn set_countdown(&self, remaining: Duration, urgent: bool) {
        trace!(remaining_ms = remaining.as_millis() as u64, urgent, "countdown");
    }

    fn set_score(&self, player: PlayerId, score: u32) {
        info!(player = player.0, score, "score");
    }

    fn set_freeze(&self, player: PlayerId, remaining: Duration) {
        trace!(player = player.0, remaining_ms = remaining.as_millis() as u64, "freeze");
    }

    fn announce_winners(&self, winners: &[PlayerId]) {
        let winners: Vec<u8> = winners.iter().map(|p| p.0).collect();
        info!(?winners, "game over");
    }

    fn show_hint(&self, sets: &[Vec<Slot>]) {
        for set in sets {
            let slots: Vec<u16> = set.iter().map(|s| s.0).collect();
            debug!(?slots, "hint");
        }
    }
}
