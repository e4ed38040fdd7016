//! In-memory display sink.
//!
//! Records events in call order. Useful for hosts that poll instead of
//! reacting, and for asserting on what the engine showed.
//!
//! The dealer refreshes the countdown every tick, and every 10 ms inside the
//! warning window, so an unbounded recorder grows for as long as the game
//! runs. Long-running hosts should use `RecordingSink::bounded`, which keeps
//! only the most recent events.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::core::{Card, PlayerId, Slot};

use super::sink::DisplaySink;

/// One recorded display call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    PlaceCard { card: Card, slot: Slot },
    RemoveCard { slot: Slot },
    PlaceToken { player: PlayerId, slot: Slot },
    RemoveToken { player: PlayerId, slot: Slot },
    RemoveTokens,
    Countdown { remaining: Duration, urgent: bool },
    Score { player: PlayerId, score: u32 },
    Freeze { player: PlayerId, remaining: Duration },
    Winners(Vec<PlayerId>),
    Hint(Vec<Vec<Slot>>),
}

/// Display sink that stores events.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<VecDeque<DisplayEvent>>,
    /// Oldest events are dropped past this many. `None` keeps everything.
    limit: Option<usize>,
}

impl RecordingSink {
    /// Create an empty recorder that keeps every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty recorder that keeps at most `limit` events.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(limit)),
            limit: Some(limit),
        }
    }

    fn push(&self, event: DisplayEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }
            while events.len() >= limit {
                events.pop_front();
            }
        }
        events.push_back(event);
    }

    /// Number of events currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every event held, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Count events matching a predicate.
    pub fn count(&self, pred: impl Fn(&DisplayEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }

    /// The most recent countdown update.
    #[must_use]
    pub fn last_countdown(&self) -> Option<(Duration, bool)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find_map(|e| match e {
                DisplayEvent::Countdown { remaining, urgent } => Some((*remaining, *urgent)),
                _ => None,
            })
    }

    /// The announced winners, if the game has ended.
    #[must_use]
    pub fn winners(&self) -> Option<Vec<PlayerId>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find_map(|e| match e {
                DisplayEvent::Winners(w) => Some(w.clone()),
                _ => None,
            })
    }
}

impl DisplaySink for RecordingSink {
    fn place_card(&self, card: Card, slot: Slot) {
        self.push(DisplayEvent::PlaceCard { card, slot });
    }

    fn remove_card(&self, slot: Slot) {
        self.push(DisplayEvent::RemoveCard { slot });
    }

    fn place_token(&self, player: PlayerId, slot: Slot) {
        self.push(DisplayEvent::PlaceToken { player, slot });
    }

    fn remove_token(&self, player: PlayerId, slot: Slot) {
        self.push(DisplayEvent::RemoveToken { player, slot });
    }

    fn remove_tokens(&self) {
        self.push(DisplayEvent::RemoveTokens);
    }

    fn set_countdown(&self, remaining: Duration, urgent: bool) {
        self.push(DisplayEvent::Countdown { remaining, urgent });
    }

    fn set_score(&self, player: PlayerId, score: u32) {
        self.push(DisplayEvent::Score { player, score });
    }

    fn set_freeze(&self, player: PlayerId, remaining: Duration) {
        self.push(DisplayEvent::Freeze { player, remaining });
    }

    fn announce_winners(&self, winners: &[PlayerId]) {
        self.push(DisplayEvent::Winners(winners.to_vec()));
    }

    fn show_hint(&self, sets: &[Vec<Slot>]) {
        self.push(DisplayEvent::Hint(sets.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let sink = RecordingSink::new();
        sink.place_card(Card(4), Slot(0));
        sink.set_countdown(Duration::from_secs(60), false);
        sink.set_countdown(Duration::from_secs(3), true);

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.events()[0], DisplayEvent::PlaceCard { card: Card(4), slot: Slot(0) });
        assert_eq!(sink.last_countdown(), Some((Duration::from_secs(3), true)));
    }

    #[test]
    fn test_count_and_clear() {
        let sink = RecordingSink::new();
        sink.place_token(PlayerId(0), Slot(1));
        sink.place_token(PlayerId(1), Slot(1));
        sink.remove_tokens();

        assert_eq!(sink.count(|e| matches!(e, DisplayEvent::PlaceToken { .. })), 2);
        assert!(sink.winners().is_none());

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_bounded_keeps_newest() {
        let sink = RecordingSink::bounded(3);
        for secs in 0..1000 {
            sink.set_countdown(Duration::from_secs(secs), false);
        }
        sink.announce_winners(&[PlayerId(1)]);

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.events()[0],
            DisplayEvent::Countdown { remaining: Duration::from_secs(998), urgent: false }
        );
        assert_eq!(sink.last_countdown(), Some((Duration::from_secs(999), false)));
        assert_eq!(sink.winners(), Some(vec![PlayerId(1)]));
    }

    #[test]
    fn test_bounded_zero_records_nothing() {
        let sink = RecordingSink::bounded(0);
        sink.remove_tokens();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_winners() {
        let sink = RecordingSink::new();
        sink.announce_winners(&[PlayerId(0), PlayerId(2)]);
        assert_eq!(sink.winners(), Some(vec![PlayerId(0), PlayerId(2)]));
    }
}
