//! Error type for game construction and thread lifecycle.
//!
//! Gameplay itself never fails: stale submissions, interrupted waits and full
//! input queues are ordinary control flow. Only configuration, thread spawning
//! and thread joining can produce a `GameError`.

use thiserror::Error;

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("thread {0} panicked")]
    ThreadPanicked(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GameError>;
