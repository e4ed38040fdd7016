//! Table state: the grid, its inverse index, open slots and player marks.
//!
//! `Table` is plain data with no locking of its own. The `Board` owns it
//! behind a mutex and hands out a `TableGuard` for every mutation.
//!
//! ## Invariants
//!
//! - `open_slots` holds exactly the empty slots, so open + occupied = table size
//! - `card_to_slot` is the inverse of `slot_to_card`
//! - a player holds at most `set_size` marks, never two on the same slot

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::{Card, GameRng, PlayerId, PlayerMap, Slot};

/// Marks held by one player, in the order they were placed.
pub type Marks = SmallVec<[Slot; 4]>;

/// The shared grid.
#[derive(Clone, Debug)]
pub struct Table {
    slot_to_card: Vec<Option<Card>>,
    card_to_slot: FxHashMap<Card, Slot>,
    open_slots: VecDeque<Slot>,
    marks: PlayerMap<Marks>,
    set_size: usize,
}

impl Table {
    /// Create an empty table. Every slot starts open, in slot order.
    pub fn new(table_size: usize, player_count: usize, set_size: usize) -> Self {
        Self {
            slot_to_card: vec![None; table_size],
            card_to_slot: FxHashMap::default(),
            open_slots: Slot::all(table_size).collect(),
            marks: PlayerMap::with_default(player_count),
            set_size,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slot_to_card.len()
    }

    /// Cards in a set, and so the number of marks that fills a player's row.
    #[must_use]
    pub fn set_size(&self) -> usize {
        self.set_size
    }

    /// Number of players with a mark row.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.marks.player_count()
    }

    /// Card in a slot, if any.
    #[must_use]
    pub fn card_at(&self, slot: Slot) -> Option<Card> {
        self.slot_to_card.get(slot.index()).copied().flatten()
    }

    /// Slot holding a card, if the card is on the table.
    #[must_use]
    pub fn slot_of(&self, card: Card) -> Option<Slot> {
        self.card_to_slot.get(&card).copied()
    }

    /// Number of cards on the table.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.card_to_slot.len()
    }

    /// Number of empty slots.
    #[must_use]
    pub fn open_slot_count(&self) -> usize {
        self.open_slots.len()
    }

    /// Empty slots in refill order.
    pub fn open_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.open_slots.iter().copied()
    }

    /// Occupied slots with their cards, in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (Slot, Card)> + '_ {
        self.slot_to_card
            .iter()
            .enumerate()
            .filter_map(|(i, card)| card.map(|c| (Slot(i as u16), c)))
    }

    /// Cards on the table, in slot order.
    #[must_use]
    pub fn cards(&self) -> Vec<Card> {
        self.occupied().map(|(_, card)| card).collect()
    }

    /// A player's marks.
    #[must_use]
    pub fn marks(&self, player: PlayerId) -> &[Slot] {
        &self.marks[player]
    }

    /// Whether a player has marked a slot.
    #[must_use]
    pub fn has_mark(&self, player: PlayerId, slot: Slot) -> bool {
        self.marks[player].contains(&slot)
    }

    /// Whether a player holds a full row of marks.
    #[must_use]
    pub fn is_full(&self, player: PlayerId) -> bool {
        self.marks[player].len() >= self.set_size
    }

    // === Mutation ===
    //
    // Called through `TableGuard`, which keeps the board's lock-free
    // counters in step and reports to the display.

    pub(crate) fn place_card(&mut self, card: Card, slot: Slot) {
        debug_assert!(self.card_at(slot).is_none(), "{slot} is occupied");
        debug_assert!(self.slot_of(card).is_none(), "{card} is already on the table");

        self.slot_to_card[slot.index()] = Some(card);
        self.card_to_slot.insert(card, slot);
        self.open_slots.retain(|&s| s != slot);
    }

    pub(crate) fn remove_card(&mut self, slot: Slot) -> Option<Card> {
        let card = self.slot_to_card.get_mut(slot.index())?.take()?;
        self.card_to_slot.remove(&card);
        self.open_slots.push_back(slot);
        Some(card)
    }

    pub(crate) fn pop_open_slot(&mut self) -> Option<Slot> {
        self.open_slots.pop_front()
    }

    pub(crate) fn shuffle_open_slots(&mut self, rng: &mut GameRng) {
        rng.shuffle(self.open_slots.make_contiguous());
    }

    /// Add a mark. Fails on a full row or a slot already marked.
    pub(crate) fn mark(&mut self, player: PlayerId, slot: Slot) -> bool {
        if self.is_full(player) || self.has_mark(player, slot) {
            return false;
        }
        self.marks[player].push(slot);
        true
    }

    /// Remove a mark, reporting whether it existed.
    pub(crate) fn unmark(&mut self, player: PlayerId, slot: Slot) -> bool {
        let row = &mut self.marks[player];
        match row.iter().position(|&s| s == slot) {
            Some(pos) => {
                row.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drop every mark on a slot, returning the players who lost one.
    pub(crate) fn clear_marks_on(&mut self, slot: Slot) -> SmallVec<[PlayerId; 4]> {
        let mut cleared = SmallVec::new();
        for (player, row) in self.marks.iter_mut() {
            if let Some(pos) = row.iter().position(|&s| s == slot) {
                row.remove(pos);
                cleared.push(player);
            }
        }
        cleared
    }

    pub(crate) fn clear_all_marks(&mut self) {
        for (_, row) in self.marks.iter_mut() {
            row.clear();
        }
    }
}
