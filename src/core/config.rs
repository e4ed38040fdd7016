//! Game configuration.
//!
//! Everything the engine treats as a constant lives here: table geometry,
//! card space, player counts and timing. The config is read-only once a game
//! is built; every thread shares it through an `Arc`.
//!
//! ## Loading
//!
//! ```
//! use rust_set::core::GameConfig;
//!
//! let config = GameConfig::from_toml_str("computer_players = 4\nhints = true").unwrap();
//! assert_eq!(config.player_count(), 4);
//! assert_eq!(config.deck_size, 81);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{GameError, Result};

/// Complete game configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Players driven by an external input source.
    pub human_players: usize,

    /// Players driven by their own auto-play thread.
    pub computer_players: usize,

    /// Cards per set, which is also the number of values per feature.
    pub set_size: usize,

    /// Features per card.
    pub feature_count: usize,

    /// Cards in the deck. At most `set_size ^ feature_count`.
    pub deck_size: usize,

    /// Slots on the table grid.
    pub table_size: usize,

    /// Round length before the table is cleared and redealt.
    pub turn_timeout_millis: u64,

    /// Remaining time below which the countdown is shown as urgent.
    pub turn_timeout_warning_millis: u64,

    /// Freeze applied after a correct set.
    pub point_freeze_millis: u64,

    /// Freeze applied after an incorrect set.
    pub penalty_freeze_millis: u64,

    /// Show the sets present on the table after every deal.
    pub hints: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            human_players: 0,
            computer_players: 2,
            set_size: 3,
            feature_count: 4,
            deck_size: 81,
            table_size: 12,
            turn_timeout_millis: 60_000,
            turn_timeout_warning_millis: 5_000,
            point_freeze_millis: 1_000,
            penalty_freeze_millis: 3_000,
            hints: false,
        }
    }
}

impl GameConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the number of human and computer players.
    #[must_use]
    pub fn with_players(mut self, human: usize, computer: usize) -> Self {
        self.human_players = human;
        self.computer_players = computer;
        self
    }

    /// Set the table size.
    #[must_use]
    pub fn with_table_size(mut self, slots: usize) -> Self {
        self.table_size = slots;
        self
    }

    /// Set the deck size.
    #[must_use]
    pub fn with_deck_size(mut self, cards: usize) -> Self {
        self.deck_size = cards;
        self
    }

    /// Set the round length and warning window.
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration, warning: Duration) -> Self {
        self.turn_timeout_millis = timeout.as_millis() as u64;
        self.turn_timeout_warning_millis = warning.as_millis() as u64;
        self
    }

    /// Set the point and penalty freeze durations.
    #[must_use]
    pub fn with_freezes(mut self, point: Duration, penalty: Duration) -> Self {
        self.point_freeze_millis = point.as_millis() as u64;
        self.penalty_freeze_millis = penalty.as_millis() as u64;
        self
    }

    /// Enable or disable hints.
    #[must_use]
    pub fn with_hints(mut self, hints: bool) -> Self {
        self.hints = hints;
        self
    }

    /// Total number of players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.human_players + self.computer_players
    }

    /// Number of distinct cards the feature encoding can express.
    #[must_use]
    pub fn card_space(&self) -> usize {
        u32::try_from(self.feature_count)
            .ok()
            .and_then(|exp| self.set_size.checked_pow(exp))
            .unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_millis)
    }

    #[must_use]
    pub fn turn_timeout_warning(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_warning_millis)
    }

    #[must_use]
    pub fn point_freeze(&self) -> Duration {
        Duration::from_millis(self.point_freeze_millis)
    }

    #[must_use]
    pub fn penalty_freeze(&self) -> Duration {
        Duration::from_millis(self.penalty_freeze_millis)
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let players = self.player_count();
        if players == 0 {
            return Err(GameError::InvalidConfig("at least one player is required".into()));
        }
        if players > 255 {
            return Err(GameError::InvalidConfig(format!(
                "at most 255 players supported, got {players}"
            )));
        }
        if self.set_size < 2 {
            return Err(GameError::InvalidConfig(format!(
                "set_size must be at least 2, got {}",
                self.set_size
            )));
        }
        if self.feature_count == 0 {
            return Err(GameError::InvalidConfig("feature_count must be positive".into()));
        }
        if self.table_size < self.set_size || self.table_size > usize::from(u16::MAX) {
            return Err(GameError::InvalidConfig(format!(
                "table_size must be between {} and {}, got {}",
                self.set_size,
                u16::MAX,
                self.table_size
            )));
        }
        if self.deck_size > self.card_space() {
            return Err(GameError::InvalidConfig(format!(
                "deck_size {} exceeds the {} distinct cards of {} features with {} values",
                self.deck_size,
                self.card_space(),
                self.feature_count,
                self.set_size
            )));
        }
        if self.turn_timeout_millis == 0 {
            return Err(GameError::InvalidConfig("turn_timeout_millis must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.card_space(), 81);
        assert_eq!(config.player_count(), 2);
        assert_eq!(config.turn_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_builder_pattern() {
        let config = GameConfig::new()
            .with_players(1, 3)
            .with_table_size(9)
            .with_turn_timeout(Duration::from_secs(30), Duration::from_secs(3))
            .with_freezes(Duration::from_millis(10), Duration::from_millis(20))
            .with_hints(true);

        assert_eq!(config.player_count(), 4);
        assert_eq!(config.table_size, 9);
        assert_eq!(config.turn_timeout_millis, 30_000);
        assert_eq!(config.turn_timeout_warning(), Duration::from_secs(3));
        assert_eq!(config.point_freeze(), Duration::from_millis(10));
        assert_eq!(config.penalty_freeze(), Duration::from_millis(20));
        assert!(config.hints);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(GameConfig::new().with_players(0, 0).validate().is_err());
        assert!(GameConfig::new().with_players(200, 100).validate().is_err());
        assert!(GameConfig::new().with_table_size(2).validate().is_err());
        assert!(GameConfig::new().with_deck_size(82).validate().is_err());

        let mut config = GameConfig::new();
        config.turn_timeout_millis = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = GameConfig::from_toml_str(
            "human_players = 1\ncomputer_players = 1\nturn_timeout_millis = 5000\n",
        )
        .unwrap();

        assert_eq!(config.player_count(), 2);
        assert_eq!(config.turn_timeout_millis, 5_000);
        assert_eq!(config.table_size, 12);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            GameConfig::from_toml_str("table_size = \"twelve\""),
            Err(GameError::ConfigParse(_))
        ));
        assert!(matches!(
            GameConfig::from_toml_str("computer_players = 0"),
            Err(GameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = GameConfig::default().with_hints(true);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
