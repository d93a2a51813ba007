//! Auto-DJ scheduler
//!
//! Owns the mix plan end to end: walks the track queue, arms one
//! [`ActiveTransition`] at a time, pre-loads the next track onto the idle
//! deck, and rotates decks as each transition completes. Driven by a single
//! `tick()` per frame from the host loop; all deck mutation goes through the
//! [`DeckService`].
//!
//! Running out of plan is the normal way a mix ends, not an error: after the
//! last transition the final track simply plays to its end and the scheduler
//! deactivates itself.

use std::fmt;

use crate::model::{AnalysisJob, JobStatus, MixInstructions, Track, Transition};
use crate::queue::TrackQueue;
use crate::service::{DeckEvent, DeckService};
use crate::transition::{ActiveTransition, TransitionPhase};
use crate::types::DeckId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DjStatus {
    NoMixLoaded,
    Playing,
    Paused,
}

impl fmt::Display for DjStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DjStatus::NoMixLoaded => "no_mix_loaded",
            DjStatus::Playing => "playing",
            DjStatus::Paused => "paused",
        };
        write!(f, "{}", s)
    }
}

/// Read-only view of the mix for status display
#[derive(Debug, Clone)]
pub struct DjSnapshot {
    pub status: DjStatus,
    pub current_position: f64,
    pub current_track: Option<Track>,
}

pub struct AutoDj {
    plan: Vec<Transition>,
    queue: TrackQueue,
    /// Sequential playback: no transitions, advance on natural track end
    manual: bool,
    /// Index into `plan` of the next transition to arm
    next_transition: usize,
    current: Option<ActiveTransition>,
    active: bool,
    paused: bool,
    /// Current queue track has started playing
    started: bool,
    playing_deck: DeckId,
    completed: usize,
}

impl AutoDj {
    pub fn new(instructions: &MixInstructions, tracks: Vec<Track>) -> Self {
        Self {
            plan: instructions.transitions.clone(),
            queue: TrackQueue::new(tracks),
            manual: false,
            next_transition: 0,
            current: None,
            active: false,
            paused: false,
            started: false,
            playing_deck: DeckId::A,
            completed: 0,
        }
    }

    /// Sequential player for a plain track list: no transition plan, each
    /// track plays to its natural end and the queue advances.
    pub fn manual(tracks: Vec<Track>) -> Self {
        Self {
            plan: Vec::new(),
            queue: TrackQueue::new(tracks),
            manual: true,
            next_transition: 0,
            current: None,
            active: false,
            paused: false,
            started: false,
            playing_deck: DeckId::A,
            completed: 0,
        }
    }

    /// Build a scheduler from a finished analysis job; None unless the job
    /// completed with mix instructions attached.
    pub fn from_job(job: &AnalysisJob) -> Option<Self> {
        if job.status != JobStatus::Completed {
            return None;
        }
        let instructions = job.mix_instructions.as_ref()?;
        Some(Self::new(instructions, job.tracks.clone()))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn completed_transitions(&self) -> usize {
        self.completed
    }

    /// Begin the mix: load the first track and arm the first transition
    pub fn start(&mut self, service: &mut DeckService) {
        if self.active {
            log::warn!("auto-dj already running, start ignored");
            return;
        }
        let Some(first) = self.queue.current().cloned() else {
            log::warn!("auto-dj start with an empty queue, nothing to play");
            return;
        };

        self.active = true;
        self.paused = false;
        self.started = false;
        self.playing_deck = DeckId::A;
        self.next_transition = 0;
        self.completed = 0;

        service.load_track(self.playing_deck, &first);
        self.arm_next(service);
        log::info!(
            "auto-dj started: {} tracks, {} transitions planned",
            self.queue.len(),
            self.plan.len()
        );
    }

    /// Stop the mix; safe to call repeatedly
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.current = None;
        log::info!(
            "auto-dj stopped after {} of {} transitions",
            self.completed,
            self.plan.len()
        );
    }

    pub fn pause(&mut self, service: &mut DeckService) {
        if !self.active || self.paused {
            return;
        }
        self.paused = true;
        for deck in DeckId::ALL {
            if service.state(deck).is_playing {
                service.pause_deck(deck);
            }
        }
    }

    pub fn resume(&mut self, service: &mut DeckService) {
        if !self.active || !self.paused {
            return;
        }
        self.paused = false;
        if self.started {
            if let Err(e) = service.play_deck(self.playing_deck) {
                log::warn!("auto-dj resume failed: {}", e);
            }
        }
    }

    /// Arm the next planned transition and pre-load its incoming track onto
    /// the idle deck.
    fn arm_next(&mut self, service: &mut DeckService) {
        let Some(transition) = self.plan.get(self.next_transition).cloned() else {
            self.current = None;
            return;
        };
        self.next_transition += 1;

        let incoming_deck = self.playing_deck.other();
        service.load_track(incoming_deck, &transition.track_b);
        log::info!(
            "auto-dj: armed transition {} at {:.1}s, pre-loading {} on deck {}",
            transition.id,
            transition.transition_start,
            transition.track_b.id,
            incoming_deck
        );
        self.current = Some(ActiveTransition::new(transition, self.playing_deck));
    }

    /// Advance the mix by one frame
    pub fn tick(&mut self, service: &mut DeckService) {
        if !self.active {
            return;
        }

        for event in service.poll() {
            match event {
                DeckEvent::Loaded(deck) => {
                    if !self.started && deck == self.playing_deck && !self.paused {
                        match service.play_deck(deck) {
                            Ok(()) => self.started = true,
                            Err(e) => log::warn!("auto-dj: failed to start deck {}: {}", deck, e),
                        }
                    }
                }
                DeckEvent::LoadFailed(deck, error) => {
                    log::warn!("auto-dj: deck {} failed to load: {}", deck, error);
                    if !self.started && deck == self.playing_deck {
                        // Nothing ever played; give up
                        self.stop();
                        return;
                    }
                    // Pre-load failure: abandon the remaining plan and let
                    // the current track play out.
                    self.current = None;
                    self.next_transition = self.plan.len();
                }
                DeckEvent::Ended(deck) => {
                    if deck != self.playing_deck {
                        continue;
                    }
                    let mid_handoff = self
                        .current
                        .as_ref()
                        .is_some_and(|t| t.phase() != TransitionPhase::Before);
                    if mid_handoff {
                        continue;
                    }
                    if self.manual {
                        if let Some(next) = self.queue.advance().cloned() {
                            log::info!("manual playback: next track {}", next.id);
                            service.load_track(self.playing_deck, &next);
                            self.started = false;
                            continue;
                        }
                    }
                    // Either no transition remains or the track ran out
                    // before its window opened; the mix is over.
                    log::info!("auto-dj: track ended on deck {}, mix finished", deck);
                    self.stop();
                    return;
                }
            }
        }

        if self.paused {
            return;
        }

        if let Some(mut transition) = self.current.take() {
            transition.tick(service);
            if transition.is_complete() {
                self.completed += 1;
                self.playing_deck = transition.incoming();
                self.queue.advance();
                self.arm_next(service);
            } else {
                self.current = Some(transition);
            }
        }
    }

    pub fn snapshot(&self, service: &DeckService) -> DjSnapshot {
        let status = if !self.active {
            DjStatus::NoMixLoaded
        } else if self.paused {
            DjStatus::Paused
        } else {
            DjStatus::Playing
        };
        DjSnapshot {
            status,
            current_position: service.state(self.playing_deck).current_position,
            current_track: self.queue.current().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::clock::SimTime;
    use crate::model::Technique;
    use crate::service::tests::{sim_service, track, StubSource};
    use std::time::Duration;

    const TICK: f64 = 0.05;

    fn plan(transitions: Vec<Transition>, tracks: &[Track]) -> MixInstructions {
        MixInstructions {
            total_duration: tracks.iter().map(|t| t.duration).sum(),
            total_tracks: tracks.len() as u32,
            transitions,
            metadata: serde_json::Value::Null,
        }
    }

    fn transition(id: &str, position: u32, a: &Track, b: &Track, start: f64, duration: f64) -> Transition {
        Transition {
            id: id.to_string(),
            position,
            track_a: a.clone(),
            track_b: b.clone(),
            transition_start: start,
            transition_duration: duration,
            technique: Technique::Crossfade,
            bpm_adjustment: 0.0,
        }
    }

    /// Drive simulated time forward until the mix deactivates; panics if it
    /// never does. Real sleeps are tiny, just enough for the loader thread.
    fn run_to_end(time: &SimTime, service: &mut DeckService, dj: &mut AutoDj, max_ticks: usize) {
        for _ in 0..max_ticks {
            if !dj.is_active() {
                return;
            }
            time.advance(TICK);
            dj.tick(service);
            std::thread::sleep(Duration::from_micros(100));
        }
        panic!("mix did not finish in {} ticks", max_ticks);
    }

    #[test]
    fn test_full_mix_runs_to_completion() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());

        let a = track("a", None, 15.0);
        let b = track("b", None, 30.0);
        let c = track("c", None, 5.0);
        let instructions = plan(
            vec![
                transition("t1", 0, &a, &b, 10.0, 2.0),
                transition("t2", 1, &b, &c, 20.0, 2.0),
            ],
            &[a.clone(), b.clone(), c.clone()],
        );

        let mut dj = AutoDj::new(&instructions, vec![a, b, c]);
        dj.start(&mut service);
        assert!(dj.is_active());

        run_to_end(&time, &mut service, &mut dj, 2000);
        assert_eq!(dj.completed_transitions(), 2);
        assert!(!service.state(DeckId::A).is_playing);
        assert!(!service.state(DeckId::B).is_playing);
        assert_eq!(dj.snapshot(&service).status, DjStatus::NoMixLoaded);
    }

    #[test]
    fn test_preload_failure_lets_current_track_play_out() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());

        let a = track("a", None, 15.0);
        let b = track("bad-b", None, 30.0);
        let instructions = plan(
            vec![transition("t1", 0, &a, &b, 10.0, 2.0)],
            &[a.clone(), b.clone()],
        );

        let mut dj = AutoDj::new(&instructions, vec![a, b]);
        dj.start(&mut service);
        run_to_end(&time, &mut service, &mut dj, 2000);

        // The bad pre-load abandons the plan; track a still finishes
        assert_eq!(dj.completed_transitions(), 0);
        assert!((service.state(DeckId::A).current_position - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_manual_mode_plays_queue_sequentially() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());

        let a = track("a", None, 5.0);
        let b = track("b", None, 4.0);
        let mut dj = AutoDj::manual(vec![a, b]);
        dj.start(&mut service);
        assert!(dj.is_active());

        run_to_end(&time, &mut service, &mut dj, 1000);

        // Both tracks played to their natural end on the same deck, with no
        // transitions involved
        assert_eq!(dj.completed_transitions(), 0);
        let state = service.state(DeckId::A);
        assert_eq!(state.track.as_ref().unwrap().id, "b");
        assert!((state.current_position - 4.0).abs() < 1e-6);
        assert!(service.state(DeckId::B).track.is_none());
    }

    #[test]
    fn test_first_track_failure_stops_the_mix() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());

        let a = track("bad-a", None, 15.0);
        let instructions = plan(Vec::new(), &[a.clone()]);

        let mut dj = AutoDj::new(&instructions, vec![a]);
        dj.start(&mut service);
        run_to_end(&time, &mut service, &mut dj, 2000);
        assert_eq!(dj.completed_transitions(), 0);
    }

    #[test]
    fn test_empty_queue_start_is_a_noop() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());
        let instructions = plan(Vec::new(), &[]);

        let mut dj = AutoDj::new(&instructions, Vec::new());
        dj.start(&mut service);
        assert!(!dj.is_active());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());
        let a = track("a", None, 15.0);
        let instructions = plan(Vec::new(), &[a.clone()]);

        let mut dj = AutoDj::new(&instructions, vec![a]);
        dj.start(&mut service);
        dj.stop();
        dj.stop();
        assert!(!dj.is_active());
    }

    #[test]
    fn test_pause_freezes_the_mix() {
        let time = SimTime::new();
        let mut service = sim_service(&time, StubSource::new());
        let a = track("a", None, 15.0);
        let instructions = plan(Vec::new(), &[a.clone()]);

        let mut dj = AutoDj::new(&instructions, vec![a]);
        dj.start(&mut service);

        // Let it load and begin playing
        for _ in 0..100 {
            time.advance(TICK);
            dj.tick(&mut service);
            if service.state(DeckId::A).is_playing {
                break;
            }
            std::thread::sleep(Duration::from_micros(100));
        }
        assert!(service.state(DeckId::A).is_playing);

        dj.pause(&mut service);
        assert_eq!(dj.snapshot(&service).status, DjStatus::Paused);
        let frozen = service.state(DeckId::A).current_position;
        time.advance(5.0);
        dj.tick(&mut service);
        assert!((service.state(DeckId::A).current_position - frozen).abs() < 1e-9);

        dj.resume(&mut service);
        assert_eq!(dj.snapshot(&service).status, DjStatus::Playing);
        time.advance(1.0);
        dj.tick(&mut service);
        assert!(service.state(DeckId::A).current_position > frozen);
    }

    #[test]
    fn test_from_job_requires_completed_results() {
        let job = AnalysisJob {
            id: "job-1".to_string(),
            status: JobStatus::Processing,
            playlist_name: None,
            tracks: Vec::new(),
            mix_instructions: None,
            error_message: None,
        };
        assert!(AutoDj::from_job(&job).is_none());

        let job = AnalysisJob {
            status: JobStatus::Completed,
            mix_instructions: Some(plan(Vec::new(), &[])),
            ..job
        };
        assert!(AutoDj::from_job(&job).is_some());
    }
}
