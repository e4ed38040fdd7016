//! Set submissions and the queue that carries them to the dealer.

use crossbeam_channel::{bounded, Receiver, Sender};
use smallvec::SmallVec;

use crate::core::{Card, PlayerId, Slot};

/// One marked card as the player saw it when submitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pick {
    pub slot: Slot,
    pub card: Card,
    /// The slot's epoch at submission. If it moved, the card left the slot
    /// in between, even if it has since been dealt back.
    pub epoch: u64,
}

impl Pick {
    pub fn new(slot: Slot, card: Card, epoch: u64) -> Self {
        Self { slot, card, epoch }
    }
}

/// A player's claim that its marked cards form a set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Submitting player.
    pub player: PlayerId,

    /// The marked cards, in marking order.
    pub picks: SmallVec<[Pick; 4]>,
}

impl Request {
    /// Create a request.
    pub fn new(player: PlayerId, picks: impl IntoIterator<Item = Pick>) -> Self {
        Self {
            player,
            picks: picks.into_iter().collect(),
        }
    }

    /// The submitted cards, in marking order.
    #[must_use]
    pub fn cards(&self) -> SmallVec<[Card; 4]> {
        self.picks.iter().map(|p| p.card).collect()
    }

    /// Whether the request names any of `cards`.
    #[must_use]
    pub fn references_any(&self, cards: &[Card]) -> bool {
        self.picks.iter().any(|p| cards.contains(&p.card))
    }
}

/// Bounded request queue.
///
/// A player has at most one request outstanding, so one slot per player is
/// enough for every submitter to get in without waiting on another.
pub fn request_queue(player_count: usize) -> (Sender<Request>, Receiver<Request>) {
    bounded(player_count.max(1))
}
