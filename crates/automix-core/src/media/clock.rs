//! Clock-driven media element
//!
//! Derives the playhead from a clock delta times the playback rate instead
//! of rendering audio. Used as the fallback when no audio device is
//! available, and with a simulated time source for deterministic tests of
//! the transition and scheduler logic.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::{Clip, MediaElement, MediaEvent};
use crate::types::Seconds;

/// Shared, manually-advanced clock for simulation
#[derive(Clone)]
pub struct SimTime(Arc<Mutex<f64>>);

impl SimTime {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(0.0)))
    }

    /// Move the clock forward by `dt` seconds
    pub fn advance(&self, dt: f64) {
        *self.0.lock().unwrap() += dt;
    }

    pub fn now(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::new()
    }
}

enum TimeSource {
    Wall,
    Simulated(SimTime),
}

/// Media element whose position is `base + (now - anchor) * rate`
///
/// The anchor is re-taken on every transport or rate change so the formula
/// only ever spans one segment of constant rate.
pub struct ClockElement {
    source: TimeSource,
    epoch: Instant,
    duration: Seconds,
    base: Seconds,
    anchor: f64,
    rate: f64,
    volume: f64,
    paused: bool,
    ended: bool,
    pending: Vec<MediaEvent>,
}

impl ClockElement {
    /// Wall-clock element (device-less playback)
    pub fn new() -> Self {
        Self::with_source(TimeSource::Wall)
    }

    /// Element driven by a simulated clock
    pub fn simulated(time: SimTime) -> Self {
        Self::with_source(TimeSource::Simulated(time))
    }

    fn with_source(source: TimeSource) -> Self {
        Self {
            source,
            epoch: Instant::now(),
            duration: 0.0,
            base: 0.0,
            anchor: 0.0,
            rate: 1.0,
            volume: 1.0,
            paused: true,
            ended: false,
            pending: Vec::new(),
        }
    }

    /// Current per-element volume (informational; nothing is rendered)
    pub fn volume(&self) -> f64 {
        self.volume
    }

    fn now(&self) -> f64 {
        match &self.source {
            TimeSource::Wall => self.epoch.elapsed().as_secs_f64(),
            TimeSource::Simulated(time) => time.now(),
        }
    }

    fn position_now(&self) -> Seconds {
        if self.paused {
            return self.base;
        }
        let position = self.base + (self.now() - self.anchor) * self.rate;
        if self.duration > 0.0 {
            position.clamp(0.0, self.duration)
        } else {
            position.max(0.0)
        }
    }

    /// Re-anchor at the current position so a rate or transport change does
    /// not retroactively rescale elapsed time.
    fn rebase(&mut self) {
        self.base = self.position_now();
        self.anchor = self.now();
    }
}

impl Default for ClockElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for ClockElement {
    fn set_clip(&mut self, clip: Arc<Clip>) {
        self.duration = clip.duration();
        self.base = 0.0;
        self.anchor = self.now();
        self.paused = true;
        self.ended = false;
    }

    fn clear_clip(&mut self) {
        self.duration = 0.0;
        self.base = 0.0;
        self.anchor = self.now();
        self.paused = true;
        self.ended = false;
    }

    fn play(&mut self, offset: Option<Seconds>) {
        if let Some(offset) = offset {
            self.base = if self.duration > 0.0 {
                offset.clamp(0.0, self.duration)
            } else {
                offset.max(0.0)
            };
        } else {
            self.base = self.position_now();
        }
        self.anchor = self.now();
        self.paused = false;
        self.ended = false;
        self.pending.push(MediaEvent::Playing);
    }

    fn pause(&mut self) {
        self.rebase();
        self.paused = true;
        self.pending.push(MediaEvent::Paused);
    }

    fn seek(&mut self, position: Seconds) {
        self.base = if self.duration > 0.0 {
            position.clamp(0.0, self.duration)
        } else {
            position.max(0.0)
        };
        self.anchor = self.now();
        self.ended = false;
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_rate(&mut self, rate: f64) {
        if rate <= 0.0 {
            return;
        }
        self.rebase();
        self.rate = rate;
    }

    fn current_time(&self) -> Seconds {
        self.position_now()
    }

    fn duration(&self) -> Seconds {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        let mut events = std::mem::take(&mut self.pending);
        if !self.paused && !self.ended && self.duration > 0.0 && self.position_now() >= self.duration {
            self.base = self.duration;
            self.paused = true;
            self.ended = true;
            events.push(MediaEvent::Ended);
        }
        events
    }
}
