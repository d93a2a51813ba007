//! Dual-deck playback engine for automated DJ mixes
//!
//! Consumes mix instructions produced by the analysis backend and executes
//! them on two decks: background track loading, equal-power crossfades,
//! tempo matching, and an auto-DJ scheduler that walks the plan. Audio goes
//! out through cpal when a device is present, with a clock-driven fallback
//! otherwise.

pub mod api;
pub mod crossfader;
pub mod deck;
pub mod decode;
pub mod error;
pub mod loader;
pub mod media;
pub mod model;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod transition;
pub mod types;

pub use types::*;
