//! Background track loader
//!
//! Moves the expensive part of loading (HTTP fetch + decode + resample) off
//! the control thread so the frame loop never stalls. Requests go to a
//! single named worker thread over an mpsc channel; the deck service drains
//! results with `try_recv` once per frame.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::LoadError;
use crate::media::Clip;
use crate::model::Track;
use crate::types::DeckId;

/// Produces a playable clip for a track
///
/// The production implementation is [`crate::api::BackendClient`] (fetch
/// over HTTP, then decode); tests substitute synthetic sources.
pub trait ClipSource: Send + Sync {
    fn load_clip(&self, track: &Track, target_sample_rate: u32) -> Result<Clip, LoadError>;
}

/// Request to load a track in the background
struct LoadRequest {
    deck: DeckId,
    track: Track,
}

/// Result of a background load
pub struct LoadResult {
    pub deck: DeckId,
    pub track_id: String,
    pub result: Result<Arc<Clip>, LoadError>,
}

/// Handle to the background loader thread
pub struct TrackLoader {
    tx: Sender<LoadRequest>,
    rx: Receiver<LoadResult>,
    _handle: JoinHandle<()>,
}

impl TrackLoader {
    /// Spawn the loader thread
    ///
    /// `target_sample_rate` is the output device rate clips are resampled to.
    pub fn spawn(source: Arc<dyn ClipSource>, target_sample_rate: u32) -> Self {
        let (request_tx, request_rx) = std::sync::mpsc::channel::<LoadRequest>();
        let (result_tx, result_rx) = std::sync::mpsc::channel::<LoadResult>();

        let handle = thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || {
                loader_thread(request_rx, result_tx, source, target_sample_rate);
            })
            .expect("Failed to spawn track loader thread");

        log::info!(
            "TrackLoader spawned with target sample rate: {} Hz",
            target_sample_rate
        );

        Self {
            tx: request_tx,
            rx: result_rx,
            _handle: handle,
        }
    }

    /// Request loading a track (non-blocking)
    pub fn load(&self, deck: DeckId, track: Track) -> Result<(), String> {
        self.tx
            .send(LoadRequest { deck, track })
            .map_err(|e| format!("Loader thread disconnected: {}", e))
    }

    /// Try to receive a completed load result (non-blocking)
    pub fn try_recv(&self) -> Option<LoadResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("Loader thread disconnected unexpectedly");
                None
            }
        }
    }
}

fn loader_thread(
    rx: Receiver<LoadRequest>,
    tx: Sender<LoadResult>,
    source: Arc<dyn ClipSource>,
    target_sample_rate: u32,
) {
    log::info!("Track loader thread started");

    while let Ok(request) = rx.recv() {
        log::info!(
            "Loader: loading track {} for deck {}",
            request.track.id,
            request.deck
        );
        let start = std::time::Instant::now();

        let result = source
            .load_clip(&request.track, target_sample_rate)
            .map(Arc::new);

        match &result {
            Ok(clip) => log::info!(
                "Loader: track {} ready ({:.1}s of audio) in {:?}",
                request.track.id,
                clip.duration(),
                start.elapsed()
            ),
            Err(e) => log::error!("Loader: track {} failed: {}", request.track.id, e),
        }

        if tx
            .send(LoadResult {
                deck: request.deck,
                track_id: request.track.id,
                result,
            })
            .is_err()
        {
            break;
        }
    }

    log::info!("Track loader thread shutting down");
}
