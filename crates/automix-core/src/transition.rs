//! Transition execution
//!
//! An [`ActiveTransition`] drives one crossover between the two decks. It is
//! a small state machine ticked once per frame by the scheduler:
//!
//!   Before -> During -> Complete
//!
//! `Before` waits for the outgoing playhead to reach the window while
//! relaxing any leftover tempo adjustment back to native rate. `During`
//! executes the planned technique (equal-power crossfade or quick cut).
//! `Complete` is terminal; the scheduler then rotates decks and arms the
//! next transition.
//!
//! Tempo matching is a fixed per-tick slew rather than a jump. At typical
//! frame cadence the slew closes any realistic tempo gap within the first
//! second or two of the window, long before the crossfade midpoint, and
//! latches once the target rate is reached so there is no hunting.

use crate::model::{Technique, Transition};
use crate::service::DeckService;
use crate::types::{DeckId, Seconds};

/// Per-tick playback-rate step used both for tempo matching during the
/// window and for relaxing back to native rate before it.
pub(crate) const RATE_SLEW_PER_TICK: f64 = 0.002;

/// A quick cut keeps the outgoing deck running briefly under the cut so a
/// pause hiccup is never audible at the boundary.
const QUICK_CUT_PAUSE_AFTER: Seconds = 0.25;

/// Where and when the incoming deck was launched
///
/// Both coordinates are needed: the media offset to convert the incoming
/// playhead back into elapsed window time, and the window position at
/// launch as the baseline that elapsed time is added to.
#[derive(Debug, Clone, Copy)]
struct IncomingLaunch {
    /// Offset into the incoming track it started from
    media_offset: Seconds,
    /// Window position (track A timeline) at the moment of launch
    window_position: Seconds,
}

/// Upper bound on how long a quick cut takes to report completion,
/// regardless of the planned window length.
const QUICK_CUT_MAX_DURATION: Seconds = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Before,
    During,
    Complete,
}

/// One armed transition between the two decks
pub struct ActiveTransition {
    transition: Transition,
    outgoing: DeckId,
    incoming: DeckId,
    phase: TransitionPhase,
    matched_bpm: bool,
    has_cut: bool,
    outgoing_paused_after_cut: bool,
    launch: Option<IncomingLaunch>,
}

impl ActiveTransition {
    pub fn new(transition: Transition, outgoing: DeckId) -> Self {
        Self {
            transition,
            outgoing,
            incoming: outgoing.other(),
            phase: TransitionPhase::Before,
            matched_bpm: false,
            has_cut: false,
            outgoing_paused_after_cut: false,
            launch: None,
        }
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn outgoing(&self) -> DeckId {
        self.outgoing
    }

    pub fn incoming(&self) -> DeckId {
        self.incoming
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == TransitionPhase::Complete
    }

    /// Position within the window on track A's timeline
    ///
    /// Normally the outgoing playhead. When the outgoing track runs out
    /// before the window closes, time keeps flowing from the incoming deck
    /// instead so the crossfade still finishes.
    fn window_position(&self, service: &DeckService) -> Seconds {
        let outgoing = service.state(self.outgoing);
        if outgoing.is_playing {
            return outgoing.current_position;
        }
        match self.launch {
            Some(launch) => {
                let elapsed = (service.state(self.incoming).current_position
                    - launch.media_offset)
                    .max(0.0);
                launch.window_position + elapsed
            }
            None => outgoing.current_position,
        }
    }

    /// Crossfade progress in [0, 1]
    pub fn progress(&self, service: &DeckService) -> f64 {
        if self.transition.transition_duration <= 0.0 {
            return 1.0;
        }
        let elapsed = self.window_position(service) - self.transition.transition_start;
        (elapsed / self.transition.transition_duration).clamp(0.0, 1.0)
    }

    /// Crossfader position that puts `progress` worth of the mix on the
    /// incoming deck, whichever side it is on.
    fn crossfader_for(&self, progress: f64) -> f64 {
        match self.outgoing {
            DeckId::A => progress,
            DeckId::B => 1.0 - progress,
        }
    }

    /// Advance the state machine by one frame
    pub fn tick(&mut self, service: &mut DeckService) {
        match self.phase {
            TransitionPhase::Complete => {}
            TransitionPhase::Before => {
                let rate = service.state(self.outgoing).playback_rate;
                if rate != 1.0 {
                    service.set_rate(self.outgoing, slew_toward(rate, 1.0));
                }
                if service.state(self.outgoing).current_position
                    >= self.transition.transition_start
                {
                    log::info!(
                        "transition {}: window open at {:.2}s ({} -> {})",
                        self.transition.id,
                        self.transition.transition_start,
                        self.outgoing,
                        self.incoming
                    );
                    self.phase = TransitionPhase::During;
                    self.tick_during(service);
                }
            }
            TransitionPhase::During => self.tick_during(service),
        }
    }

    fn tick_during(&mut self, service: &mut DeckService) {
        match self.transition.technique {
            Technique::QuickCut => self.tick_quick_cut(service),
            Technique::Crossfade | Technique::Other => self.tick_crossfade(service),
        }
    }

    fn tick_crossfade(&mut self, service: &mut DeckService) {
        if self.launch.is_none() {
            // The first During tick may land mid-window (a stalled frame
            // loop, or the incoming clip finishing its load late). Start
            // the incoming track where it would already be, not at its
            // mix-in frame.
            let window_position = self.window_position(service);
            let within = (window_position - self.transition.transition_start).max(0.0);
            let mix_in = self.transition.track_b.mix_in_point.unwrap_or(0.0);
            let offset = mix_in + within;
            match service.play_deck_from(self.incoming, offset) {
                Ok(()) => {
                    self.launch = Some(IncomingLaunch {
                        media_offset: offset,
                        window_position: self.transition.transition_start + within,
                    })
                }
                Err(e) => {
                    // Not loaded yet; retry next tick rather than abort
                    log::warn!(
                        "transition {}: cannot start incoming deck yet: {}",
                        self.transition.id,
                        e
                    );
                    return;
                }
            }
        }

        if !self.matched_bpm {
            let target = self.transition.rate_target();
            let current = service.state(self.outgoing).playback_rate;
            let next = slew_toward(current, target);
            if next != current {
                service.set_rate(self.outgoing, next);
            }
            if next == target {
                self.matched_bpm = true;
                log::debug!(
                    "transition {}: deck {} tempo matched at rate {:.4}",
                    self.transition.id,
                    self.outgoing,
                    target
                );
            }
        }

        let progress = self.progress(service);
        service.set_crossfader(self.crossfader_for(progress));

        if progress >= 1.0 {
            service.pause_deck(self.outgoing);
            service.set_crossfader(self.crossfader_for(1.0));
            self.phase = TransitionPhase::Complete;
            log::info!(
                "transition {}: complete, deck {} now live",
                self.transition.id,
                self.incoming
            );
        }
    }

    fn tick_quick_cut(&mut self, service: &mut DeckService) {
        if !self.has_cut {
            // Start the incoming track and snap the crossfader in the same
            // tick so the cut is a single audible event.
            let window_position = self.window_position(service);
            if let Err(e) = service.play_deck_from(self.incoming, 0.0) {
                log::warn!(
                    "transition {}: cannot cut to deck {} yet: {}",
                    self.transition.id,
                    self.incoming,
                    e
                );
                return;
            }
            service.set_crossfader(self.crossfader_for(1.0));
            self.has_cut = true;
            self.launch = Some(IncomingLaunch {
                media_offset: 0.0,
                window_position,
            });
            return;
        }

        let elapsed = service.state(self.incoming).current_position;

        if !self.outgoing_paused_after_cut && elapsed >= QUICK_CUT_PAUSE_AFTER {
            service.pause_deck(self.outgoing);
            self.outgoing_paused_after_cut = true;
        }

        let settle = self
            .transition
            .transition_duration
            .min(QUICK_CUT_MAX_DURATION)
            .max(0.0);
        if elapsed >= settle {
            if !self.outgoing_paused_after_cut {
                service.pause_deck(self.outgoing);
                self.outgoing_paused_after_cut = true;
            }
            self.phase = TransitionPhase::Complete;
            log::info!(
                "transition {}: quick cut complete, deck {} now live",
                self.transition.id,
                self.incoming
            );
        }
    }
}

fn slew_toward(current: f64, target: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= RATE_SLEW_PER_TICK {
        target
    } else {
        current + RATE_SLEW_PER_TICK * delta.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::clock::SimTime;
    use crate::service::tests::{sim_service, track, wait_for_load, StubSource};
    use crate::service::DeckService;

    const TICK: f64 = 0.05;

    fn transition(
        a: crate::model::Track,
        b: crate::model::Track,
        start: f64,
        duration: f64,
        technique: Technique,
    ) -> Transition {
        Transition {
            id: "tr-1".to_string(),
            position: 0,
            track_a: a,
            track_b: b,
            transition_start: start,
            transition_duration: duration,
            technique,
            bpm_adjustment: 0.0,
        }
    }

    fn loaded_service(time: &SimTime, a: &crate::model::Track, b: &crate::model::Track) -> DeckService {
        let mut service = sim_service(time, StubSource::new());
        service.load_track(DeckId::A, a);
        wait_for_load(&mut service, DeckId::A);
        service.load_track(DeckId::B, b);
        wait_for_load(&mut service, DeckId::B);
        service
    }

    fn drive_until<F>(
        time: &SimTime,
        service: &mut DeckService,
        at: &mut ActiveTransition,
        max_ticks: usize,
        mut stop: F,
    ) where
        F: FnMut(&DeckService, &ActiveTransition) -> bool,
    {
        for _ in 0..max_ticks {
            time.advance(TICK);
            service.poll();
            at.tick(service);
            if stop(service, at) {
                return;
            }
        }
        panic!("transition did not reach expected state in {} ticks", max_ticks);
    }

    #[test]
    fn test_crossfade_tempo_matches_before_midpoint() {
        let time = SimTime::new();
        let a = track("a", Some(120.0), 180.0);
        let b = track("b", Some(128.0), 200.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 160.0, 8.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 159.0);

        let target = 128.0 / 120.0;

        // By the crossfade midpoint the outgoing deck must already sit at
        // the incoming tempo, and both decks must be audible.
        drive_until(&time, &mut service, &mut at, 200, |service, at| {
            at.progress(service) >= 0.5
        });
        assert_eq!(at.phase(), TransitionPhase::During);
        assert!((service.state(DeckId::A).playback_rate - target).abs() < 1e-12);
        assert!(service.crossfader() > 0.45 && service.crossfader() < 0.57);
        assert!(service.state(DeckId::B).is_playing);

        drive_until(&time, &mut service, &mut at, 200, |_, at| at.is_complete());
        assert!(!service.state(DeckId::A).is_playing);
        assert!(service.state(DeckId::B).is_playing);
        assert_eq!(service.crossfader(), 1.0);
        assert!((service.state(DeckId::A).current_position - 168.0).abs() < 0.2);
    }

    #[test]
    fn test_crossfade_progress_is_monotonic() {
        let time = SimTime::new();
        let a = track("a", None, 60.0);
        let b = track("b", None, 60.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 20.0, 5.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 19.0);

        let mut last = 0.0;
        drive_until(&time, &mut service, &mut at, 400, |service, at| {
            let progress = at.progress(service);
            assert!(progress >= last, "progress regressed: {} < {}", progress, last);
            last = progress;
            at.is_complete()
        });
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_quick_cut_is_atomic() {
        let time = SimTime::new();
        let a = track("a", None, 60.0);
        let b = track("b", None, 60.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 20.0, 6.0, Technique::QuickCut), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 19.9);

        // The cut itself: incoming starts and the crossfader lands fully on
        // it within the same tick.
        drive_until(&time, &mut service, &mut at, 50, |service, _| {
            service.state(DeckId::B).is_playing
        });
        assert_eq!(service.crossfader(), 1.0);
        assert_eq!(service.state(DeckId::B).current_position, 0.0);
        assert!(service.state(DeckId::A).is_playing, "outgoing keeps running under the cut");

        // Outgoing is paused shortly after, and the transition reports
        // complete within the capped settle time, not the planned 6s.
        drive_until(&time, &mut service, &mut at, 50, |_, at| at.is_complete());
        assert!(!service.state(DeckId::A).is_playing);
        assert!(service.state(DeckId::B).current_position <= QUICK_CUT_MAX_DURATION + TICK);
    }

    #[test]
    fn test_crossfade_survives_outgoing_track_ending_early() {
        let time = SimTime::new();
        // Track ends at 165s, five seconds into a 160..170 window
        let a = track("a", None, 165.0);
        let b = track("b", None, 200.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 160.0, 10.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 159.0);

        drive_until(&time, &mut service, &mut at, 400, |_, at| at.is_complete());
        assert!(service.state(DeckId::B).is_playing);
        assert_eq!(service.crossfader(), 1.0);
        assert!((service.state(DeckId::A).current_position - 165.0).abs() < 1e-6);
    }

    #[test]
    fn test_incoming_starts_at_mix_in_point() {
        let time = SimTime::new();
        let a = track("a", None, 60.0);
        let mut b = track("b", None, 60.0);
        b.mix_in_point = Some(12.5);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 20.0, 5.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 19.9);

        drive_until(&time, &mut service, &mut at, 50, |service, _| {
            service.state(DeckId::B).is_playing
        });
        assert!(service.state(DeckId::B).current_position >= 12.5);
        assert!(service.state(DeckId::B).current_position < 13.0);
    }

    #[test]
    fn test_mid_window_entry_starts_incoming_aligned() {
        let time = SimTime::new();
        // Outgoing ends at 27s, inside the 20..30 window
        let a = track("a", None, 27.0);
        let mut b = track("b", None, 60.0);
        b.mix_in_point = Some(10.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 20.0, 10.0, Technique::Crossfade), DeckId::A);

        // The first tick lands 5s into the window, as after a stalled frame
        // loop: the incoming track must come in at mix_in + 5, not at mix_in.
        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 25.0);

        drive_until(&time, &mut service, &mut at, 10, |service, _| {
            service.state(DeckId::B).is_playing
        });
        let b_start = service.state(DeckId::B).current_position;
        assert!((15.0..15.3).contains(&b_start), "incoming started at {}", b_start);
        assert!(at.progress(&service) > 0.49);

        // After the outgoing runs out at 27s, window time continues from the
        // incoming deck on the same baseline, so the crossfade still closes
        // at window end with the incoming playhead at mix_in + duration.
        drive_until(&time, &mut service, &mut at, 200, |_, at| at.is_complete());
        assert_eq!(service.crossfader(), 1.0);
        let b_end = service.state(DeckId::B).current_position;
        assert!((b_end - 20.0).abs() < 0.3, "incoming ended at {}", b_end);
    }

    #[test]
    fn test_relaxes_leftover_rate_before_window() {
        let time = SimTime::new();
        let a = track("a", None, 60.0);
        let b = track("b", None, 60.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 50.0, 5.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.set_rate(DeckId::A, 1.05);

        for _ in 0..50 {
            time.advance(TICK);
            service.poll();
            at.tick(&mut service);
        }
        assert_eq!(at.phase(), TransitionPhase::Before);
        assert_eq!(service.state(DeckId::A).playback_rate, 1.0);
    }

    #[test]
    fn test_zero_duration_window_completes_immediately() {
        let time = SimTime::new();
        let a = track("a", None, 60.0);
        let b = track("b", None, 60.0);
        let mut service = loaded_service(&time, &a, &b);
        let mut at =
            ActiveTransition::new(transition(a, b, 10.0, 0.0, Technique::Crossfade), DeckId::A);

        service.play_deck(DeckId::A).unwrap();
        service.scrub(DeckId::A, 9.9);

        drive_until(&time, &mut service, &mut at, 50, |_, at| at.is_complete());
        assert_eq!(service.crossfader(), 1.0);
        assert!(service.state(DeckId::B).is_playing);
    }
}
