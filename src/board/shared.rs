//! The shared board: one mutex around the table, plus lock-free signals.
//!
//! Every mutation goes through a `TableGuard`. The guard is the lock: the
//! table is released when it drops, on every exit path. Besides the table,
//! the board exposes three things other threads may read without the lock:
//!
//! - `is_dealing`: the dealer currently holds the lock
//! - `is_full`: a player's mark row is full (may be momentarily stale)
//! - `epoch`: how many times a slot has been emptied
//! - `has_open_slot`: at least one slot is waiting for a card

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;
use tracing::trace;

use crate::core::{Card, GameConfig, GameRng, PlayerId, PlayerMap, Slot};
use crate::display::DisplaySink;

use super::table::Table;

/// Table shared between the dealer and every player thread.
pub struct Board {
    table: Mutex<Table>,
    dealing: AtomicBool,
    mark_counts: PlayerMap<AtomicUsize>,
    open_slots: AtomicUsize,
    epochs: Box<[AtomicU64]>,
    set_size: usize,
    display: Arc<dyn DisplaySink>,
}

impl Board {
    /// Create an empty board sized by the config.
    pub fn new(config: &GameConfig, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            table: Mutex::new(Table::new(
                config.table_size,
                config.player_count(),
                config.set_size,
            )),
            dealing: AtomicBool::new(false),
            mark_counts: PlayerMap::new(config.player_count(), |_| AtomicUsize::new(0)),
            open_slots: AtomicUsize::new(config.table_size),
            epochs: (0..config.table_size).map(|_| AtomicU64::new(0)).collect(),
            set_size: config.set_size,
            display,
        }
    }

    /// Acquire the table for a player.
    pub fn lock(&self) -> TableGuard<'_> {
        TableGuard {
            board: self,
            table: self.table.lock().unwrap_or_else(PoisonError::into_inner),
            dealer: false,
        }
    }

    /// Acquire the table for the dealer.
    ///
    /// `is_dealing` reads true until the guard drops.
    pub fn lock_for_dealer(&self) -> TableGuard<'_> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        self.dealing.store(true, Ordering::Release);
        TableGuard {
            board: self,
            table,
            dealer: true,
        }
    }

    /// Whether the dealer currently holds the table.
    #[must_use]
    pub fn is_dealing(&self) -> bool {
        self.dealing.load(Ordering::Acquire)
    }

    /// Whether a player's mark row is full. Does not take the lock.
    ///
    /// For hosts and tests watching the table. Players decide under the
    /// lock with `Table::is_full`, since a full row still accepts an unmark.
    #[must_use]
    pub fn is_full(&self, player: PlayerId) -> bool {
        self.mark_counts[player].load(Ordering::Acquire) >= self.set_size
    }

    /// Whether any slot is waiting for a card. Does not take the lock.
    #[must_use]
    pub fn has_open_slot(&self) -> bool {
        self.open_slots.load(Ordering::Acquire) > 0
    }

    /// Number of times a slot has been emptied. Does not take the lock.
    #[must_use]
    pub fn epoch(&self, slot: Slot) -> u64 {
        self.epochs
            .get(slot.index())
            .map_or(0, |e| e.load(Ordering::Acquire))
    }

    /// Number of slots.
    #[must_use]
    pub fn size(&self) -> usize {
        self.epochs.len()
    }

    /// Locked read of one slot.
    #[must_use]
    pub fn card_at(&self, slot: Slot) -> Option<Card> {
        self.lock().card_at(slot)
    }

    /// Locked copy of a player's marks.
    #[must_use]
    pub fn marks(&self, player: PlayerId) -> Vec<Slot> {
        self.lock().marks(player).to_vec()
    }

    /// Locked copy of the whole table.
    #[must_use]
    pub fn snapshot(&self) -> Table {
        self.lock().clone()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("size", &self.size())
            .field("dealing", &self.is_dealing())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the table.
///
/// Dereferences to `Table` for reads. Mutations keep the board's lock-free
/// counters in step and report to the display.
pub struct TableGuard<'a> {
    board: &'a Board,
    table: MutexGuard<'a, Table>,
    dealer: bool,
}

impl TableGuard<'_> {
    /// Deal a card into an empty slot.
    pub fn place_card(&mut self, card: Card, slot: Slot) {
        self.table.place_card(card, slot);
        self.sync_open_slots();
        self.board.display.place_card(card, slot);
    }

    /// Empty a slot. Marks on it are left for the caller to reconcile.
    pub fn remove_card(&mut self, slot: Slot) -> Option<Card> {
        let card = self.table.remove_card(slot)?;
        self.sync_open_slots();
        self.board.epochs[slot.index()].fetch_add(1, Ordering::AcqRel);
        self.board.display.remove_card(slot);
        Some(card)
    }

    /// Take the next empty slot in refill order.
    pub fn pop_open_slot(&mut self) -> Option<Slot> {
        let slot = self.table.pop_open_slot();
        self.sync_open_slots();
        slot
    }

    /// Randomize the refill order.
    pub fn shuffle_open_slots(&mut self, rng: &mut GameRng) {
        self.table.shuffle_open_slots(rng);
    }

    /// Mark a slot for a player. Fails on a full row or a repeated slot.
    pub fn mark(&mut self, player: PlayerId, slot: Slot) -> bool {
        if !self.table.mark(player, slot) {
            return false;
        }
        self.sync_count(player);
        self.board.display.place_token(player, slot);
        true
    }

    /// Remove a player's mark, reporting whether there was one.
    pub fn unmark(&mut self, player: PlayerId, slot: Slot) -> bool {
        if !self.table.unmark(player, slot) {
            return false;
        }
        self.sync_count(player);
        self.board.display.remove_token(player, slot);
        true
    }

    /// Remove every mark on a slot, returning the players who lost one.
    pub fn clear_marks_on(&mut self, slot: Slot) -> SmallVec<[PlayerId; 4]> {
        let cleared = self.table.clear_marks_on(slot);
        for &player in &cleared {
            self.sync_count(player);
            self.board.display.remove_token(player, slot);
        }
        cleared
    }

    /// Remove every mark on the table.
    pub fn clear_all_marks(&mut self) {
        self.table.clear_all_marks();
        for count in self.board.mark_counts.values() {
            count.store(0, Ordering::Release);
        }
        self.board.display.remove_tokens();
        trace!("marks cleared");
    }

    fn sync_open_slots(&self) {
        self.board.open_slots.store(self.table.open_slot_count(), Ordering::Release);
    }

    fn sync_count(&self, player: PlayerId) {
        self.board.mark_counts[player].store(self.table.marks(player).len(), Ordering::Release);
    }
}

impl Deref for TableGuard<'_> {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.table
    }
}

impl Drop for TableGuard<'_> {
    fn drop(&mut self) {
        if self.dealer {
            self.board.dealing.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayEvent, RecordingSink};

    fn board() -> (Board, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let config = GameConfig::new().with_players(2, 0);
        (Board::new(&config, sink.clone()), sink)
    }

    #[test]
    fn test_dealer_flag_follows_guard() {
        let (board, _) = board();
        assert!(!board.is_dealing());
        {
            let _guard = board.lock_for_dealer();
            assert!(board.is_dealing());
        }
        assert!(!board.is_dealing());

        let _guard = board.lock();
        assert!(!board.is_dealing());
    }

    #[test]
    fn test_is_full_tracks_marks() {
        let (board, _) = board();
        let p = PlayerId(0);
        {
            let mut table = board.lock();
            table.mark(p, Slot(0));
            table.mark(p, Slot(1));
        }
        assert!(!board.is_full(p));

        board.lock().mark(p, Slot(2));
        assert!(board.is_full(p));

        board.lock().unmark(p, Slot(1));
        assert!(!board.is_full(p));

        board.lock().mark(p, Slot(1));
        board.lock_for_dealer().clear_all_marks();
        assert!(!board.is_full(p));
    }

    #[test]
    fn test_remove_card_bumps_epoch() {
        let (board, _) = board();
        let slot = Slot(4);
        board.lock().place_card(Card(10), slot);
        assert_eq!(board.epoch(slot), 0);

        assert_eq!(board.lock().remove_card(slot), Some(Card(10)));
        assert_eq!(board.epoch(slot), 1);

        // Removing an empty slot changes nothing
        assert_eq!(board.lock().remove_card(slot), None);
        assert_eq!(board.epoch(slot), 1);
        assert_eq!(board.epoch(Slot(99)), 0);
    }

    #[test]
    fn test_mutations_reach_display() {
        let (board, sink) = board();
        {
            let mut table = board.lock();
            table.place_card(Card(1), Slot(0));
            table.mark(PlayerId(1), Slot(0));
            table.clear_marks_on(Slot(0));
            table.remove_card(Slot(0));
        }

        assert_eq!(
            sink.events(),
            vec![
                DisplayEvent::PlaceCard { card: Card(1), slot: Slot(0) },
                DisplayEvent::PlaceToken { player: PlayerId(1), slot: Slot(0) },
                DisplayEvent::RemoveToken { player: PlayerId(1), slot: Slot(0) },
                DisplayEvent::RemoveCard { slot: Slot(0) },
            ]
        );
    }

    #[test]
    fn test_failed_mark_is_silent() {
        let (board, sink) = board();
        let mut table = board.lock();
        assert!(table.mark(PlayerId(0), Slot(3)));
        assert!(!table.mark(PlayerId(0), Slot(3)));
        assert!(!table.unmark(PlayerId(0), Slot(7)));
        drop(table);

        assert_eq!(sink.count(|e| matches!(e, DisplayEvent::PlaceToken { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, DisplayEvent::RemoveToken { .. })), 0);
    }

    #[test]
    fn test_open_slot_signal_follows_table() {
        let (board, _) = board();
        assert!(board.has_open_slot());
        {
            let mut table = board.lock_for_dealer();
            while let Some(slot) = table.pop_open_slot() {
                table.place_card(Card(u32::from(slot.0)), slot);
            }
        }
        assert!(!board.has_open_slot());

        board.lock().remove_card(Slot(7));
        assert!(board.has_open_slot());
        board.lock().place_card(Card(99), Slot(7));
        assert!(!board.has_open_slot());
    }

    #[test]
    fn test_snapshot_and_reads() {
        let (board, _) = board();
        board.lock().place_card(Card(3), Slot(2));
        board.lock().mark(PlayerId(0), Slot(2));

        assert_eq!(board.card_at(Slot(2)), Some(Card(3)));
        assert_eq!(board.marks(PlayerId(0)), vec![Slot(2)]);
        assert_eq!(board.snapshot().card_count(), 1);
        assert_eq!(board.size(), 12);
    }
}
