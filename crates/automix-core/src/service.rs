//! Deck service: single-writer state store over both playback units
//!
//! Every mutation goes through a command method that updates the playback
//! unit and the mirrored [`DeckState`] together, so observers never see one
//! without the other. The presentation layer reads state snapshots and
//! issues commands; it never touches the media elements directly.
//!
//! `poll()` runs once per frame: it drains loader results and media events,
//! syncs playhead positions, and converts playback failures into deck-level
//! error state instead of propagating them.

use crate::crossfader;
use crate::deck::PlaybackUnit;
use crate::error::{DeckError, LoadError};
use crate::loader::TrackLoader;
use crate::media::{MediaElement, MediaEvent};
use crate::model::Track;
use crate::types::{DeckId, Seconds, NUM_DECKS};

/// Observable state of one deck
///
/// Written only by [`DeckService`]; consumers treat it as read-only.
#[derive(Debug, Clone, Default)]
pub struct DeckState {
    pub track: Option<Track>,
    pub is_loading: bool,
    pub is_loaded: bool,
    pub is_playing: bool,
    /// Deck volume in [0, 1], independent of the crossfader
    pub volume: f64,
    /// 1.0 = native tempo
    pub playback_rate: f64,
    /// Authoritative playhead in seconds
    pub current_position: Seconds,
    /// Most recent load failure, if any
    pub load_error: Option<LoadError>,
}

impl DeckState {
    fn new() -> Self {
        Self {
            volume: 1.0,
            playback_rate: 1.0,
            ..Default::default()
        }
    }
}

/// Deck-level events surfaced by `poll()`
#[derive(Debug, Clone, PartialEq)]
pub enum DeckEvent {
    Loaded(DeckId),
    LoadFailed(DeckId, LoadError),
    Ended(DeckId),
}

pub struct DeckService {
    units: [PlaybackUnit; NUM_DECKS],
    states: [DeckState; NUM_DECKS],
    crossfader: f64,
    loader: TrackLoader,
}

impl DeckService {
    pub fn new(elements: [Box<dyn MediaElement>; NUM_DECKS], loader: TrackLoader) -> Self {
        let [element_a, element_b] = elements;
        Self {
            units: [
                PlaybackUnit::new(DeckId::A, element_a),
                PlaybackUnit::new(DeckId::B, element_b),
            ],
            states: [DeckState::new(), DeckState::new()],
            crossfader: 0.0,
            loader,
        }
    }

    pub fn state(&self, deck: DeckId) -> &DeckState {
        &self.states[deck.index()]
    }

    pub fn crossfader(&self) -> f64 {
        self.crossfader
    }

    /// Assign a track to a deck and start loading it in the background
    ///
    /// Idempotent: re-requesting the already-loaded track is a no-op, and a
    /// request while the deck is still loading is rejected with a warning.
    pub fn load_track(&mut self, deck: DeckId, track: &Track) {
        let idx = deck.index();
        if !self.units[idx].begin_load(track) {
            return;
        }

        // A new track always starts at native tempo, even on a deck that
        // was tempo-matched in a previous transition.
        self.units[idx].set_rate(1.0);

        let state = &mut self.states[idx];
        state.track = Some(track.clone());
        state.is_loading = true;
        state.is_loaded = false;
        state.is_playing = false;
        state.current_position = 0.0;
        state.playback_rate = 1.0;
        state.load_error = None;

        if let Err(e) = self.loader.load(deck, track.clone()) {
            log::error!("deck {}: failed to dispatch load: {}", deck, e);
            self.units[idx].fail_load(&track.id);
            let state = &mut self.states[idx];
            state.is_loading = false;
            state.load_error = Some(LoadError::Aborted(e));
        }
    }

    /// Clear a deck back to empty
    pub fn unload(&mut self, deck: DeckId) {
        let idx = deck.index();
        self.units[idx].unload();
        let volume = self.states[idx].volume;
        self.states[idx] = DeckState { volume, ..DeckState::new() };
    }

    pub fn play_deck(&mut self, deck: DeckId) -> Result<(), DeckError> {
        let idx = deck.index();
        if !self.units[idx].is_loaded() {
            return Err(DeckError::DeckNotLoaded(deck));
        }
        self.units[idx].play(None);
        self.states[idx].is_playing = true;
        Ok(())
    }

    /// Start playback from an explicit offset
    pub fn play_deck_from(&mut self, deck: DeckId, offset: Seconds) -> Result<(), DeckError> {
        let idx = deck.index();
        if !self.units[idx].is_loaded() {
            return Err(DeckError::DeckNotLoaded(deck));
        }
        self.units[idx].play(Some(offset));
        let state = &mut self.states[idx];
        state.is_playing = true;
        state.current_position = offset;
        Ok(())
    }

    pub fn pause_deck(&mut self, deck: DeckId) {
        let idx = deck.index();
        if !self.units[idx].is_loaded() {
            log::debug!("deck {}: pause on unloaded deck ignored", deck);
            return;
        }
        self.units[idx].pause();
        self.states[idx].is_playing = false;
    }

    /// Move the playhead; a playing deck restarts from the new offset
    pub fn scrub(&mut self, deck: DeckId, position: Seconds) {
        let idx = deck.index();
        if !self.units[idx].is_loaded() {
            log::debug!("deck {}: scrub on unloaded deck ignored", deck);
            return;
        }
        let position = position.clamp(0.0, self.units[idx].duration());
        if self.states[idx].is_playing {
            self.units[idx].play(Some(position));
        } else {
            self.units[idx].seek(position);
        }
        self.states[idx].current_position = position;
    }

    pub fn set_volume(&mut self, deck: DeckId, volume: f64) {
        self.states[deck.index()].volume = volume.clamp(0.0, 1.0);
        self.apply_gain(deck);
    }

    /// Set the deck's tempo by target BPM
    ///
    /// Fails synchronously (mutating nothing) with `InvalidBpm` when the BPM
    /// is not a positive finite number or the loaded track has no known
    /// source tempo to derive a rate from, and with `DeckNotLoaded` when the
    /// deck has no loaded track at all.
    pub fn set_bpm(&mut self, deck: DeckId, bpm: f64) -> Result<(), DeckError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(DeckError::InvalidBpm(bpm));
        }
        let idx = deck.index();
        if !self.units[idx].is_loaded() {
            return Err(DeckError::DeckNotLoaded(deck));
        }
        let source_bpm = self.states[idx]
            .track
            .as_ref()
            .and_then(|t| t.bpm)
            .filter(|b| *b > 0.0)
            .ok_or(DeckError::InvalidBpm(bpm))?;
        self.set_rate(deck, bpm / source_bpm);
        Ok(())
    }

    /// Set the playback rate directly (1.0 = native tempo)
    pub fn set_rate(&mut self, deck: DeckId, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            log::warn!("deck {}: ignoring non-positive rate {}", deck, rate);
            return;
        }
        let idx = deck.index();
        self.units[idx].set_rate(rate);
        self.states[idx].playback_rate = rate;
    }

    /// Move the crossfader and reapply both decks' output gains
    pub fn set_crossfader(&mut self, position: f64) {
        self.crossfader = position.clamp(0.0, 1.0);
        self.apply_gain(DeckId::A);
        self.apply_gain(DeckId::B);
    }

    fn apply_gain(&mut self, deck: DeckId) {
        let idx = deck.index();
        let gain = crossfader::output_volume(self.states[idx].volume, deck, self.crossfader);
        self.units[idx].set_volume(gain);
    }

    /// Once-per-frame sync: drain loader results and media events, update
    /// playhead positions, and surface deck-level events.
    pub fn poll(&mut self) -> Vec<DeckEvent> {
        let mut events = Vec::new();

        while let Some(result) = self.loader.try_recv() {
            let idx = result.deck.index();
            match result.result {
                Ok(clip) => {
                    if self.units[idx].finish_load(&result.track_id, clip) {
                        let state = &mut self.states[idx];
                        state.is_loading = false;
                        state.is_loaded = true;
                        state.load_error = None;
                        events.push(DeckEvent::Loaded(result.deck));
                    }
                }
                Err(error) => {
                    if self.units[idx].fail_load(&result.track_id) {
                        let state = &mut self.states[idx];
                        state.is_loading = false;
                        state.is_loaded = false;
                        state.load_error = Some(error.clone());
                        events.push(DeckEvent::LoadFailed(result.deck, error));
                    }
                }
            }
        }

        for deck in DeckId::ALL {
            let idx = deck.index();
            for event in self.units[idx].poll_events() {
                match event {
                    MediaEvent::Playing => self.states[idx].is_playing = true,
                    MediaEvent::Paused => self.states[idx].is_playing = false,
                    MediaEvent::Ended => {
                        self.states[idx].is_playing = false;
                        events.push(DeckEvent::Ended(deck));
                    }
                }
            }
            self.states[idx].current_position = self.units[idx].current_time();
        }

        events
    }
}
