//! Equal-power crossfader curve
//!
//! Maps a scalar crossfader position in [0, 1] (0 = full deck A, 1 = full
//! deck B) to per-deck gain. Each deck holds unity gain through its own half
//! of the sweep and follows a quarter-sine/cosine ramp through the other
//! half, so combined acoustic energy stays roughly constant at the center
//! instead of dipping the way a linear fade does.

use std::f64::consts::FRAC_PI_2;

use crate::types::DeckId;

/// Gain for one deck at the given crossfader position
///
/// Endpoints: `gain(A, 0) == 1`, `gain(A, 1) == 0`, `gain(B, 0) == 0`,
/// `gain(B, 1) == 1`; both decks are at unity at the midpoint.
pub fn gain(deck: DeckId, position: f64) -> f64 {
    let p = position.clamp(0.0, 1.0);
    match deck {
        DeckId::A => {
            if p <= 0.5 {
                1.0
            } else {
                ((p - 0.5) * 2.0 * FRAC_PI_2).cos()
            }
        }
        DeckId::B => {
            if p >= 0.5 {
                1.0
            } else {
                (p * 2.0 * FRAC_PI_2).sin()
            }
        }
    }
}

/// Final output volume for a deck
///
/// Deck volume and crossfader gain are independent factors and always
/// multiply; neither ever overwrites the other.
pub fn output_volume(deck_volume: f64, deck: DeckId, position: f64) -> f64 {
    deck_volume.clamp(0.0, 1.0) * gain(deck, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_endpoints() {
        assert!((gain(DeckId::A, 0.0) - 1.0).abs() < EPSILON);
        assert!(gain(DeckId::A, 1.0).abs() < EPSILON);
        assert!(gain(DeckId::B, 0.0).abs() < EPSILON);
        assert!((gain(DeckId::B, 1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_equal_power_midpoint() {
        assert_eq!(gain(DeckId::A, 0.5), 1.0);
        assert_eq!(gain(DeckId::B, 0.5), 1.0);
    }

    #[test]
    fn test_monotonic_ramps() {
        let mut prev = gain(DeckId::A, 0.5);
        for i in 1..=100 {
            let p = 0.5 + i as f64 / 200.0;
            let g = gain(DeckId::A, p);
            assert!(g <= prev, "deck A gain must fall past the midpoint");
            prev = g;
        }

        let mut prev = gain(DeckId::B, 0.0);
        for i in 1..=100 {
            let p = i as f64 / 200.0;
            let g = gain(DeckId::B, p);
            assert!(g >= prev, "deck B gain must rise up to the midpoint");
            prev = g;
        }
    }

    #[test]
    fn test_position_is_clamped() {
        assert_eq!(gain(DeckId::A, -0.5), 1.0);
        assert!(gain(DeckId::A, 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_output_volume_multiplies() {
        // Deck volume scales the crossfader gain, it does not replace it.
        let g = gain(DeckId::A, 0.75);
        assert!((output_volume(0.5, DeckId::A, 0.75) - 0.5 * g).abs() < EPSILON);
        assert_eq!(output_volume(2.0, DeckId::A, 0.0), 1.0);
        assert_eq!(output_volume(-1.0, DeckId::A, 0.0), 0.0);
    }
}
