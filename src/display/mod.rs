//! Display sink.
//!
//! The engine never draws anything. It reports what changed through a
//! `DisplaySink`; every call is fire-and-forget.
//!
//! - `TracingSink`: renders events as structured log lines
//! - `RecordingSink`: keeps events in memory for inspection, optionally capped

pub mod sink;
pub mod recording;

pub use sink::{DisplaySink, TracingSink};
pub use recording::{DisplayEvent, RecordingSink};
