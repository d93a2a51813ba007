//! Playback unit for one deck
//!
//! Wraps a media element together with the track assigned to it and its
//! load lifecycle. Loading is split in two: `begin_load` claims the deck
//! (rejecting concurrent loads), and `finish_load`/`fail_load` apply the
//! background loader's result, ignoring results for tracks the deck has
//! since moved away from.

use std::sync::Arc;

use crate::media::{Clip, MediaElement, MediaEvent};
use crate::model::Track;
use crate::types::{DeckId, Seconds};

/// Load lifecycle of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Empty,
    Loading,
    Loaded,
    Failed,
}

/// One deck's playback resource
pub struct PlaybackUnit {
    id: DeckId,
    element: Box<dyn MediaElement>,
    track: Option<Track>,
    load_state: LoadState,
}

impl PlaybackUnit {
    pub fn new(id: DeckId, element: Box<dyn MediaElement>) -> Self {
        Self {
            id,
            element,
            track: None,
            load_state: LoadState::Empty,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    /// Claim the deck for a new load
    ///
    /// Returns true when a load should actually be dispatched. A load while
    /// another is in flight is rejected, and re-requesting the track that is
    /// already loaded is a no-op.
    pub fn begin_load(&mut self, track: &Track) -> bool {
        match self.load_state {
            LoadState::Loading => {
                log::warn!(
                    "deck {}: load of {} requested while another load is in flight, ignoring",
                    self.id,
                    track.id
                );
                false
            }
            LoadState::Loaded
                if self.track.as_ref().is_some_and(|t| t.id == track.id) =>
            {
                log::debug!("deck {}: track {} already loaded", self.id, track.id);
                false
            }
            _ => {
                self.element.pause();
                self.track = Some(track.clone());
                self.load_state = LoadState::Loading;
                true
            }
        }
    }

    /// Apply a successful load result; returns false for stale results
    pub fn finish_load(&mut self, track_id: &str, clip: Arc<Clip>) -> bool {
        if self.track.as_ref().map(|t| t.id.as_str()) != Some(track_id) {
            log::warn!(
                "deck {}: discarding stale load result for track {}",
                self.id,
                track_id
            );
            return false;
        }
        self.element.set_clip(clip);
        self.load_state = LoadState::Loaded;
        log::info!("deck {}: track {} loaded", self.id, track_id);
        true
    }

    /// Record a failed load; returns false for stale results
    pub fn fail_load(&mut self, track_id: &str) -> bool {
        if self.track.as_ref().map(|t| t.id.as_str()) != Some(track_id) {
            return false;
        }
        self.element.clear_clip();
        self.load_state = LoadState::Failed;
        true
    }

    /// Clear the deck back to empty
    pub fn unload(&mut self) {
        self.element.clear_clip();
        self.track = None;
        self.load_state = LoadState::Empty;
    }

    pub fn play(&mut self, offset: Option<Seconds>) {
        self.element.play(offset);
    }

    pub fn pause(&mut self) {
        self.element.pause();
    }

    pub fn seek(&mut self, position: Seconds) {
        self.element.seek(position);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.element.set_volume(volume);
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.element.set_rate(rate);
    }

    pub fn current_time(&self) -> Seconds {
        self.element.current_time()
    }

    pub fn duration(&self) -> Seconds {
        self.element.duration()
    }

    pub fn is_paused(&self) -> bool {
        self.element.is_paused()
    }

    pub fn poll_events(&mut self) -> Vec<MediaEvent> {
        self.element.poll_events()
    }
}
