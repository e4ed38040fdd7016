//! Set rules.
//!
//! The dealer consults a `SetOracle` to:
//! - Judge each submitted set
//! - Decide whether the game can continue
//! - Produce hints
//!
//! `FeatureOracle` is the classic rule for cards encoded as feature digits.

pub mod oracle;

pub use oracle::{FeatureOracle, SetOracle};
