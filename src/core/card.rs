//! Card and slot identifiers.
//!
//! A `Card` is an opaque id in `0..deck_size`; only the rules oracle gives it
//! meaning. A `Slot` is a position on the table grid in `0..table_size`.

use serde::{Deserialize, Serialize};

/// Card identifier. The deck holds each card exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Card(pub u32);

impl Card {
    /// Create a new card ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Every card of a deck with `deck_size` cards, in id order.
    pub fn deck(deck_size: usize) -> impl Iterator<Item = Card> {
        (0..deck_size as u32).map(Card)
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Card({})", self.0)
    }
}

/// Table position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(pub u16);

impl Slot {
    /// Create a new slot.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get the slot as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterate over every slot of a table with `table_size` positions.
    pub fn all(table_size: usize) -> impl Iterator<Item = Slot> {
        (0..table_size as u16).map(Slot)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}
