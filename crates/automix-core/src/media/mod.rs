//! Media playback elements
//!
//! A `MediaElement` is the seam between deck logic and the platform audio
//! pipeline. Deck commands are synchronous from the caller's perspective;
//! the element applies them at its own pace and reports transport changes
//! through polled events, which the deck service drains once per frame.

pub mod clock;
pub mod error;
pub mod output;

use std::sync::Arc;

use crate::types::{Seconds, StereoSample};

/// Decoded audio ready for playback
///
/// Samples are stereo at a fixed rate; the output stage interpolates when
/// the device runs at a different rate or the deck plays at a non-unity
/// tempo.
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Vec<StereoSample>,
    pub sample_rate: u32,
}

impl Clip {
    /// Length in seconds
    pub fn duration(&self) -> Seconds {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Transport events emitted by a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Playing,
    Paused,
    /// The clip ran to its end; the element is paused at the final position
    Ended,
}

/// One playback slot of the platform audio pipeline
///
/// Implementations: [`clock::ClockElement`] (position derived from a clock,
/// no audible output) and [`output::CpalElement`] (one lane of the shared
/// cpal stream).
pub trait MediaElement: Send {
    /// Swap in a decoded clip; the element ends up paused at position 0
    fn set_clip(&mut self, clip: Arc<Clip>);

    /// Drop the current clip
    fn clear_clip(&mut self);

    /// Start playback, optionally from a new offset in seconds
    fn play(&mut self, offset: Option<Seconds>);

    fn pause(&mut self);

    /// Move the playhead without changing the paused state
    fn seek(&mut self, position: Seconds);

    /// Per-element volume in [0, 1], applied after the crossfader math
    fn set_volume(&mut self, volume: f64);

    /// Playback rate; 1.0 is native tempo. Non-positive values are ignored.
    fn set_rate(&mut self, rate: f64);

    /// Current playhead in seconds
    fn current_time(&self) -> Seconds;

    /// Clip length in seconds (0.0 when nothing is loaded)
    fn duration(&self) -> Seconds;

    fn is_paused(&self) -> bool;

    /// Drain transport events accumulated since the last poll
    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_duration() {
        let clip = Clip {
            samples: vec![StereoSample::silence(); 480],
            sample_rate: 48000,
        };
        assert!((clip.duration() - 0.01).abs() < 1e-9);

        let empty = Clip { samples: Vec::new(), sample_rate: 0 };
        assert_eq!(empty.duration(), 0.0);
    }
}
