//! Deck and track-loading error types

use thiserror::Error;

use crate::types::DeckId;

/// Errors that can occur while fetching and decoding a track
///
/// All variants are recoverable: the caller may retry by reloading the track.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Fetching the audio resource from the backend failed
    #[error("network error: {0}")]
    Network(String),

    /// The audio bytes were fetched but could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The container or codec is not supported
    #[error("unsupported format: {0}")]
    FormatUnsupported(String),

    /// The load was cancelled before completing
    #[error("load aborted: {0}")]
    Aborted(String),
}

/// Errors returned synchronously by deck commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeckError {
    /// Requested BPM cannot be applied: not a positive finite number, or
    /// the loaded track has no known source tempo to derive a rate from
    #[error("invalid BPM {0}: requires a positive value and a known source tempo")]
    InvalidBpm(f64),

    /// Command issued against a deck with no usable track
    #[error("deck {0} has no loaded track")]
    DeckNotLoaded(DeckId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeckError::DeckNotLoaded(DeckId::B);
        assert_eq!(err.to_string(), "deck B has no loaded track");

        let err = LoadError::Network("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
