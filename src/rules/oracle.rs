//! Set validity oracle.
//!
//! The dealer never interprets cards itself. It asks a `SetOracle` whether a
//! submission is a set and whether any set remains among a group of cards.

use smallvec::SmallVec;

use crate::core::Card;

/// Decides which groups of cards form a set.
///
/// Implementations must be pure: the dealer may call them while holding the
/// table lock, and hint/game-end checks call them on arbitrary card groups.
pub trait SetOracle: Send + Sync {
    /// Number of cards in a set.
    fn set_size(&self) -> usize;

    /// Check whether exactly these cards form a set.
    fn is_valid_set(&self, cards: &[Card]) -> bool;

    /// Find up to `limit` sets among `cards`, each in ascending position order.
    fn find_sets(&self, cards: &[Card], limit: usize) -> Vec<Vec<Card>>;

    // === Convenience Methods ===

    /// Check whether at least one set exists among `cards`.
    fn has_any_set(&self, cards: &[Card]) -> bool {
        !self.find_sets(cards, 1).is_empty()
    }
}

/// The classic feature rule.
///
/// A card id is read as `feature_count` digits in base `set_size`; digit `f`
/// is the card's value for feature `f`. A group of `set_size` cards is a set
/// iff, for every feature, the values are all the same or all different.
///
/// ```
/// use rust_set::core::Card;
/// use rust_set::rules::{FeatureOracle, SetOracle};
///
/// let oracle = FeatureOracle::new(3, 4);
/// // 0 = (0,0,0,0), 1 = (1,0,0,0), 2 = (2,0,0,0)
/// assert!(oracle.is_valid_set(&[Card(0), Card(1), Card(2)]));
/// // 3 = (0,1,0,0): first feature reads 0,1,0
/// assert!(!oracle.is_valid_set(&[Card(0), Card(1), Card(3)]));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureOracle {
    set_size: usize,
    feature_count: usize,
}

impl FeatureOracle {
    /// Create an oracle for cards with `feature_count` features of `set_size` values.
    pub fn new(set_size: usize, feature_count: usize) -> Self {
        assert!(set_size >= 2, "A set needs at least 2 cards");
        Self {
            set_size,
            feature_count,
        }
    }

    /// Decode a card into its feature values.
    #[must_use]
    pub fn features(&self, card: Card) -> SmallVec<[usize; 8]> {
        let mut id = card.raw() as usize;
        (0..self.feature_count)
            .map(|_| {
                let value = id % self.set_size;
                id /= self.set_size;
                value
            })
            .collect()
    }

    fn collect_sets(
        &self,
        cards: &[Card],
        start: usize,
        chosen: &mut Vec<Card>,
        limit: usize,
        out: &mut Vec<Vec<Card>>,
    ) {
        if out.len() >= limit {
            return;
        }
        if chosen.len() == self.set_size {
            if self.is_valid_set(chosen) {
                out.push(chosen.clone());
            }
            return;
        }

        let needed = self.set_size - chosen.len();
        for i in start..cards.len() {
            if cards.len() - i < needed || out.len() >= limit {
                break;
            }
            chosen.push(cards[i]);
            self.collect_sets(cards, i + 1, chosen, limit, out);
            chosen.pop();
        }
    }
}

impl SetOracle for FeatureOracle {
    fn set_size(&self) -> usize {
        self.set_size
    }

    fn is_valid_set(&self, cards: &[Card]) -> bool {
        if cards.len() != self.set_size {
            return false;
        }

        let decoded: SmallVec<[SmallVec<[usize; 8]>; 4]> =
            cards.iter().map(|&card| self.features(card)).collect();

        (0..self.feature_count).all(|feature| {
            let mut seen: SmallVec<[usize; 4]> = SmallVec::new();
            for values in &decoded {
                if !seen.contains(&values[feature]) {
                    seen.push(values[feature]);
                }
            }
            seen.len() == 1 || seen.len() == cards.len()
        })
    }

    fn find_sets(&self, cards: &[Card], limit: usize) -> Vec<Vec<Card>> {
        let mut out = Vec::new();
        if limit == 0 {
            return out;
        }
        let mut chosen = Vec::with_capacity(self.set_size);
        self.collect_sets(cards, 0, &mut chosen, limit, &mut out);
        out
    }
}
