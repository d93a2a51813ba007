//! Track queue
//!
//! Linear list of tracks plus the current index. Advances monotonically on
//! transition completion (or natural track end in manual playback) and
//! never wraps past the last track without an explicit reset.

use crate::model::Track;

#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    current: usize,
}

impl TrackQueue {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks, current: 0 }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Index of the current track
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current)
    }

    pub fn peek_next(&self) -> Option<&Track> {
        self.tracks.get(self.current + 1)
    }

    /// Move to the next track; returns None at the end of the queue
    pub fn advance(&mut self) -> Option<&Track> {
        if self.current + 1 >= self.tracks.len() {
            return None;
        }
        self.current += 1;
        self.tracks.get(self.current)
    }

    /// Return to the head of the queue
    pub fn reset(&mut self) {
        self.current = 0;
    }
}
