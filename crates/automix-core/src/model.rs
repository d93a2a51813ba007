//! Data model for tracks and mix instructions
//!
//! These records are produced by the backend analysis pipeline and consumed
//! read-only by the playback engine. Field names match the backend's JSON
//! contracts exactly.

use serde::{Deserialize, Serialize};

use crate::types::Seconds;

/// A single analyzed track
///
/// Immutable once loaded; the engine never computes BPM, key or energy
/// itself, it only executes the plan built from these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Total length in seconds
    pub duration: Seconds,
    /// Source tempo; None when analysis could not determine it
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub energy: Option<f64>,
    /// Start of the DJ-usable region, seconds into the track
    #[serde(default)]
    pub mix_in_point: Option<Seconds>,
    /// End of the DJ-usable region, seconds into the track
    #[serde(default)]
    pub mix_out_point: Option<Seconds>,
    #[serde(default)]
    pub beat_timestamps: Option<Vec<f64>>,
}

/// How a transition hands off between decks
///
/// The backend vocabulary is extensible; anything we don't recognize is
/// treated as a plain crossfade rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    #[default]
    Crossfade,
    QuickCut,
    #[serde(other)]
    Other,
}

/// One crossover event between two tracks in sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    /// Index of this transition within the mix
    pub position: u32,
    /// Outgoing track
    pub track_a: Track,
    /// Incoming track
    pub track_b: Track,
    /// Seconds into track A's timeline where the crossfade begins
    pub transition_start: Seconds,
    pub transition_duration: Seconds,
    #[serde(default)]
    pub technique: Technique,
    /// Percent tempo delta applied to the outgoing track so it approaches
    /// the incoming tempo by transition end
    #[serde(default)]
    pub bpm_adjustment: f64,
}

impl Transition {
    /// Position on track A's timeline where the window closes
    pub fn window_end(&self) -> Seconds {
        self.transition_start + self.transition_duration
    }

    /// Playback-rate target for the outgoing deck during the window
    ///
    /// Derived from the two source tempos when both are known, otherwise
    /// from the planner's percent adjustment.
    pub fn rate_target(&self) -> f64 {
        match (self.track_a.bpm, self.track_b.bpm) {
            (Some(a), Some(b)) if a > 0.0 && b > 0.0 => b / a,
            _ => 1.0 + self.bpm_adjustment / 100.0,
        }
    }
}

/// The full mix plan for one analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixInstructions {
    pub total_duration: Seconds,
    pub total_tracks: u32,
    pub transitions: Vec<Transition>,
    /// Aggregate display metadata (avg BPM, compatibility score, ...);
    /// never interpreted by the engine
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Backend analysis job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Result document from `GET /jobs/{id}/results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub mix_instructions: Option<MixInstructions>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, bpm: f64, duration: f64) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {}", id),
            artist: "Artist".to_string(),
            duration,
            bpm: Some(bpm),
            key: None,
            energy: None,
            mix_in_point: None,
            mix_out_point: None,
            beat_timestamps: None,
        }
    }

    #[test]
    fn test_rate_target_from_bpm_ratio() {
        let t = Transition {
            id: "t1".to_string(),
            position: 0,
            track_a: track("a", 120.0, 180.0),
            track_b: track("b", 128.0, 200.0),
            transition_start: 160.0,
            transition_duration: 8.0,
            technique: Technique::Crossfade,
            bpm_adjustment: 6.67,
        };
        assert!((t.rate_target() - 128.0 / 120.0).abs() < 1e-9);
        assert_eq!(t.window_end(), 168.0);
    }

    #[test]
    fn test_rate_target_falls_back_to_adjustment() {
        let mut a = track("a", 120.0, 180.0);
        a.bpm = None;
        let t = Transition {
            id: "t1".to_string(),
            position: 0,
            track_a: a,
            track_b: track("b", 128.0, 200.0),
            transition_start: 160.0,
            transition_duration: 8.0,
            technique: Technique::Crossfade,
            bpm_adjustment: 6.67,
        };
        assert!((t.rate_target() - 1.0667).abs() < 1e-9);
    }

    #[test]
    fn test_parse_transition_json() {
        let json = r#"{
            "id": "tr-1",
            "position": 0,
            "track_a": {"id": "a", "title": "One", "artist": "X", "duration": 180.0, "bpm": 120.0},
            "track_b": {"id": "b", "title": "Two", "artist": "Y", "duration": 200.0, "bpm": 128.0, "mix_in_point": 12.5},
            "transition_start": 160.0,
            "transition_duration": 8.0,
            "technique": "crossfade",
            "bpm_adjustment": 6.67
        }"#;
        let t: Transition = serde_json::from_str(json).unwrap();
        assert_eq!(t.technique, Technique::Crossfade);
        assert_eq!(t.track_b.mix_in_point, Some(12.5));
        assert_eq!(t.track_a.mix_in_point, None);
    }

    #[test]
    fn test_unknown_technique_is_tolerated() {
        let json = r#""beatmatch_fade""#;
        let technique: Technique = serde_json::from_str(json).unwrap();
        assert_eq!(technique, Technique::Other);

        let json = r#""quick_cut""#;
        let technique: Technique = serde_json::from_str(json).unwrap();
        assert_eq!(technique, Technique::QuickCut);
    }

    #[test]
    fn test_parse_analysis_job() {
        let json = r#"{
            "id": "job-1",
            "status": "completed",
            "playlist_name": "Friday Mix",
            "tracks": [{"id": "a", "title": "One", "artist": "X", "duration": 180.0}],
            "mix_instructions": {
                "total_duration": 372.0,
                "total_tracks": 2,
                "transitions": [],
                "metadata": {"avg_bpm": 124.0}
            }
        }"#;
        let job: AnalysisJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.tracks.len(), 1);
        let mix = job.mix_instructions.unwrap();
        assert_eq!(mix.total_tracks, 2);
        assert_eq!(mix.metadata["avg_bpm"], 124.0);
    }

    #[test]
    fn test_parse_job_without_instructions() {
        let json = r#"{"id": "job-2", "status": "failed", "error_message": "analysis crashed"}"#;
        let job: AnalysisJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.mix_instructions.is_none());
        assert!(job.tracks.is_empty());
    }
}
