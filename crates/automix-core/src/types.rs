//! Common types for Automix
//!
//! Fundamental audio and deck types shared by the playback engine,
//! the transition strategies and the scheduler.

/// Default sample rate when no audio device dictates one (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Number of playback decks
pub const NUM_DECKS: usize = 2;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Time in seconds, the unit used for all playback positions
pub type Seconds = f64;

/// Deck identifiers
///
/// Two independent playback slots; crossfader position 0.0 is full A,
/// 1.0 is full B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// Both decks in order
    pub const ALL: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    /// The opposite deck
    pub fn other(&self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    /// Array index (0 for A, 1 for B)
    pub fn index(&self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            DeckId::A => "A",
            DeckId::B => "B",
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single stereo sample (left and right channels)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}
