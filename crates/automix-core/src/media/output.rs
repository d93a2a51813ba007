//! CPAL audio output
//!
//! One cpal stream mixes both deck lanes. The control thread never shares
//! locks with the render callback: transport and gain changes travel through
//! per-lane atomics, and clip swaps travel through a small lock-free SPSC
//! ring so the callback never allocates or blocks.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control thread  │───push(SetClip)────►│  Lane command ring  │
//! │  (frame loop)    │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │ pop()
//!         │ Relaxed atomics (play/seek/volume/rate)   ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │    LaneShared    │◄───position sync────│ CPAL render thread  │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::error::{AudioError, AudioResult};
use super::{Clip, MediaElement, MediaEvent};
use crate::types::{DeckId, Seconds, StereoSample, NUM_DECKS};

/// Clip handoffs are rare; a tiny ring is plenty
const LANE_COMMAND_CAPACITY: usize = 8;

enum LaneCommand {
    SetClip(Arc<Clip>),
    Clear,
}

/// Lock-free state shared between one lane and its control-side element
struct LaneShared {
    /// Playhead in seconds (f64 bits), written by the render thread
    position_bits: AtomicU64,
    /// Seek target in seconds (f64 bits), applied when `seek_pending` is set
    seek_bits: AtomicU64,
    seek_pending: AtomicBool,
    playing: AtomicBool,
    volume_bits: AtomicU64,
    rate_bits: AtomicU64,
    /// Set by the render thread when the clip runs out
    ended: AtomicBool,
}

impl LaneShared {
    fn new() -> Self {
        Self {
            position_bits: AtomicU64::new(0.0_f64.to_bits()),
            seek_bits: AtomicU64::new(0.0_f64.to_bits()),
            seek_pending: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            volume_bits: AtomicU64::new(1.0_f64.to_bits()),
            rate_bits: AtomicU64::new(1.0_f64.to_bits()),
            ended: AtomicBool::new(false),
        }
    }
}

fn store_f64(cell: &AtomicU64, value: f64) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

/// Render-thread side of one deck lane
struct Lane {
    shared: Arc<LaneShared>,
    commands: rtrb::Consumer<LaneCommand>,
    clip: Option<Arc<Clip>>,
    /// Fractional frame index into the clip
    frame: f64,
}

impl Lane {
    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                LaneCommand::SetClip(clip) => {
                    self.clip = Some(clip);
                    self.frame = 0.0;
                }
                LaneCommand::Clear => {
                    self.clip = None;
                    self.frame = 0.0;
                    self.shared.playing.store(false, Ordering::Relaxed);
                }
            }
        }
        if self.shared.seek_pending.swap(false, Ordering::Relaxed) {
            if let Some(clip) = &self.clip {
                self.frame = load_f64(&self.shared.seek_bits) * clip.sample_rate as f64;
            }
        }
    }

    /// One output frame of this lane, linearly interpolated and advanced by
    /// `rate * clip_rate / output_rate`
    fn render(&mut self, output_rate: f64) -> StereoSample {
        let Some(clip) = &self.clip else {
            return StereoSample::silence();
        };
        if !self.shared.playing.load(Ordering::Relaxed) {
            return StereoSample::silence();
        }

        let len = clip.samples.len();
        let index = self.frame as usize;
        if index >= len {
            self.shared.playing.store(false, Ordering::Relaxed);
            self.shared.ended.store(true, Ordering::Relaxed);
            return StereoSample::silence();
        }

        let frac = (self.frame - index as f64) as f32;
        let s0 = clip.samples[index];
        let s1 = if index + 1 < len { clip.samples[index + 1] } else { s0 };
        let volume = load_f64(&self.shared.volume_bits) as f32;
        let rate = load_f64(&self.shared.rate_bits);
        self.frame += rate * clip.sample_rate as f64 / output_rate;

        StereoSample::new(
            s0.left + (s1.left - s0.left) * frac,
            s0.right + (s1.right - s0.right) * frac,
        ) * volume
    }

    fn publish_position(&self) {
        if let Some(clip) = &self.clip {
            store_f64(&self.shared.position_bits, self.frame / clip.sample_rate as f64);
        }
    }
}

/// Control-thread side of one deck lane
pub struct CpalElement {
    deck: DeckId,
    shared: Arc<LaneShared>,
    commands: rtrb::Producer<LaneCommand>,
    clip_duration: Seconds,
    pending: Vec<MediaEvent>,
}

impl CpalElement {
    fn request_seek(&mut self, position: Seconds) {
        store_f64(&self.shared.seek_bits, position);
        store_f64(&self.shared.position_bits, position);
        self.shared.seek_pending.store(true, Ordering::Relaxed);
    }
}

impl MediaElement for CpalElement {
    fn set_clip(&mut self, clip: Arc<Clip>) {
        self.clip_duration = clip.duration();
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.ended.store(false, Ordering::Relaxed);
        self.request_seek(0.0);
        if self.commands.push(LaneCommand::SetClip(clip)).is_err() {
            log::error!("deck {}: lane command queue full, clip dropped", self.deck);
        }
    }

    fn clear_clip(&mut self) {
        self.clip_duration = 0.0;
        self.request_seek(0.0);
        if self.commands.push(LaneCommand::Clear).is_err() {
            log::error!("deck {}: lane command queue full, clear dropped", self.deck);
        }
    }

    fn play(&mut self, offset: Option<Seconds>) {
        if let Some(offset) = offset {
            self.request_seek(offset.clamp(0.0, self.clip_duration));
        }
        self.shared.ended.store(false, Ordering::Relaxed);
        self.shared.playing.store(true, Ordering::Relaxed);
        self.pending.push(MediaEvent::Playing);
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.pending.push(MediaEvent::Paused);
    }

    fn seek(&mut self, position: Seconds) {
        self.request_seek(position.clamp(0.0, self.clip_duration));
        self.shared.ended.store(false, Ordering::Relaxed);
    }

    fn set_volume(&mut self, volume: f64) {
        store_f64(&self.shared.volume_bits, volume.clamp(0.0, 1.0));
    }

    fn set_rate(&mut self, rate: f64) {
        if rate > 0.0 {
            store_f64(&self.shared.rate_bits, rate);
        }
    }

    fn current_time(&self) -> Seconds {
        // Until the render thread has applied a pending seek, the seek
        // target is the truth.
        if self.shared.seek_pending.load(Ordering::Relaxed) {
            load_f64(&self.shared.seek_bits)
        } else {
            load_f64(&self.shared.position_bits)
        }
    }

    fn duration(&self) -> Seconds {
        self.clip_duration
    }

    fn is_paused(&self) -> bool {
        !self.shared.playing.load(Ordering::Relaxed)
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        let mut events = std::mem::take(&mut self.pending);
        if self.shared.ended.swap(false, Ordering::Relaxed) {
            events.push(MediaEvent::Ended);
        }
        events
    }
}

fn make_lane(deck: DeckId) -> (Lane, CpalElement) {
    let shared = Arc::new(LaneShared::new());
    let (tx, rx) = rtrb::RingBuffer::new(LANE_COMMAND_CAPACITY);
    let lane = Lane {
        shared: shared.clone(),
        commands: rx,
        clip: None,
        frame: 0.0,
    };
    let element = CpalElement {
        deck,
        shared,
        commands: tx,
        clip_duration: 0.0,
        pending: Vec::new(),
    };
    (lane, element)
}

/// Handle keeping the audio stream alive
///
/// Drop this to stop audio.
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
}

impl AudioOutput {
    /// Start the output stream on the default device
    ///
    /// Returns the stream handle plus one control element per deck.
    pub fn start(master_volume: f32) -> AudioResult<(Self, [CpalElement; NUM_DECKS])> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevices)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using audio device: {}", device_name);

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let (lane_a, element_a) = make_lane(DeckId::A);
        let (lane_b, element_b) = make_lane(DeckId::B);
        let mut lanes = [lane_a, lane_b];

        let output_rate = sample_rate as f64;
        let master = master_volume.clamp(0.0, 1.0);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    for lane in lanes.iter_mut() {
                        lane.apply_commands();
                    }
                    for frame in data.chunks_mut(channels) {
                        let mut mixed = StereoSample::silence();
                        for lane in lanes.iter_mut() {
                            mixed += lane.render(output_rate);
                        }
                        mixed = mixed * master;
                        frame[0] = mixed.left;
                        if channels > 1 {
                            frame[1] = mixed.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }
                    for lane in lanes.iter() {
                        lane.publish_position();
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!(
            "Audio stream started: {} channels, {}Hz",
            channels,
            sample_rate
        );

        Ok((
            Self {
                _stream: stream,
                sample_rate,
            },
            [element_a, element_b],
        ))
    }

    /// Sample rate of the output device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
