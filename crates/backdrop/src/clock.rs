//! Pause-aware playback clock.
//!
//! Effect time is wall time since the session started minus every interval
//! spent paused. While paused it reads as frozen, and resuming continues from
//! the frozen value instead of jumping ahead.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// Elapsed-time source for one render session.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    session_start: Instant,
    pause_started: Option<Instant>,
    accumulated_pause: Duration,
}

impl PlaybackClock {
    /// Starts a playing clock at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            session_start: now,
            pause_started: None,
            accumulated_pause: Duration::ZERO,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.pause_started.is_some() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Freezes the clock. Pausing a paused clock changes nothing.
    pub fn pause(&mut self, now: Instant) {
        if self.pause_started.is_none() {
            self.pause_started = Some(now);
        }
    }

    /// Resumes the clock. Resuming a playing clock changes nothing.
    pub fn resume(&mut self, now: Instant) {
        if let Some(started) = self.pause_started.take() {
            self.accumulated_pause += now.saturating_duration_since(started);
        }
    }

    /// Applies the host's playing flag. Returns true on a transition.
    pub fn sync(&mut self, playing: bool, now: Instant) -> bool {
        match (playing, self.state()) {
            (true, PlaybackState::Paused) => {
                self.resume(now);
                true
            }
            (false, PlaybackState::Playing) => {
                self.pause(now);
                true
            }
            _ => false,
        }
    }

    /// Effect time at `now`, excluding paused intervals.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let reference = self.pause_started.unwrap_or(now);
        reference
            .saturating_duration_since(self.session_start)
            .saturating_sub(self.accumulated_pause)
    }

    /// [`PlaybackClock::elapsed`] in seconds, as uploaded to `iTime`.
    pub fn elapsed_seconds(&self, now: Instant) -> f32 {
        self.elapsed(now).as_secs_f32()
    }

    pub fn accumulated_pause(&self) -> Duration {
        self.accumulated_pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn starts_at_zero() {
        let start = Instant::now();
        let clock = PlaybackClock::new(start);
        assert_eq!(clock.elapsed(start), Duration::ZERO);
        assert!(clock.is_playing());
    }

    #[test]
    fn pause_transparency() {
        // play 5s, pause 3s, play 2s => 7s of effect time
        let start = Instant::now();
        let mut clock = PlaybackClock::new(start);
        clock.pause(start + secs(5));
        assert_eq!(clock.elapsed(start + secs(8)), secs(5));
        clock.resume(start + secs(8));
        assert_eq!(clock.elapsed(start + secs(10)), secs(7));
        assert_eq!(clock.accumulated_pause(), secs(3));
    }

    #[test]
    fn frozen_while_paused() {
        let start = Instant::now();
        let mut clock = PlaybackClock::new(start);
        clock.pause(start + secs(2));
        let first = clock.elapsed(start + secs(3));
        let later = clock.elapsed(start + secs(30));
        assert_eq!(first, later);
    }

    #[test]
    fn repeated_transitions_are_idempotent() {
        let start = Instant::now();
        let mut clock = PlaybackClock::new(start);
        clock.pause(start + secs(1));
        clock.pause(start + secs(4));
        clock.resume(start + secs(6));
        clock.resume(start + secs(9));
        assert_eq!(clock.elapsed(start + secs(10)), secs(5));
    }

    #[test]
    fn sync_reports_transitions_only() {
        let start = Instant::now();
        let mut clock = PlaybackClock::new(start);
        assert!(!clock.sync(true, start));
        assert!(clock.sync(false, start + secs(1)));
        assert!(!clock.sync(false, start + secs(2)));
        assert!(clock.sync(true, start + secs(3)));
        assert_eq!(clock.elapsed(start + secs(3)), secs(1));
    }

    #[test]
    fn elapsed_never_decreases_across_toggles() {
        let start = Instant::now();
        let mut clock = PlaybackClock::new(start);
        let mut last = Duration::ZERO;
        for step in 0..40u64 {
            let now = start + Duration::from_millis(step * 250);
            clock.sync(step % 7 < 4, now);
            let elapsed = clock.elapsed(now);
            assert!(elapsed >= last, "time went backwards at step {step}");
            last = elapsed;
        }
    }
}
