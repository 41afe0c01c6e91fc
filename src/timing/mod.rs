//! Session timing: a pausable presentation clock and a fixed-rate pacer

use std::time::{Duration, Instant};

/// Per-frame interval for a target rate: `1000ms / fps`.
///
/// `fps` must be positive; callers validate before building a pacer.
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

/// Monotonic session clock that stops while paused.
///
/// Timestamps taken from [`SessionClock::elapsed`] exclude every paused
/// interval, so a recording's timeline has no gaps where capture was paused.
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Create a clock whose time zero is `start`
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Stop the clock. No-op if already paused.
    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// Restart the clock. No-op if running.
    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume_at(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Running time since start, paused intervals excluded
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let wall = now.saturating_duration_since(self.start);
        wall.saturating_sub(self.paused_total_at(now))
    }

    /// Total paused time so far, including an in-progress pause
    pub fn paused_total(&self) -> Duration {
        self.paused_total_at(Instant::now())
    }

    fn paused_total_at(&self, now: Instant) -> Duration {
        match self.paused_at {
            Some(paused_at) => self.paused_total + now.saturating_duration_since(paused_at),
            None => self.paused_total,
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Deadline-based pacing at a fixed interval.
///
/// Each `wait` sleeps until the next deadline and advances it by one
/// interval. When a cycle overruns, `wait` returns immediately and the
/// deadline is re-anchored to now, so a slow frame never causes a burst of
/// catch-up frames.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep for the remainder of the current interval.
    ///
    /// Returns the time actually slept.
    pub fn wait(&mut self) -> Duration {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.interval;
            return Duration::ZERO;
        }

        let remaining = self.next_deadline - now;
        std::thread::sleep(remaining);
        self.next_deadline += self.interval;
        remaining
    }

    /// Re-anchor the schedule so the next deadline is one interval from now.
    pub fn reset(&mut self) {
        self.next_deadline = Instant::now() + self.interval;
    }
}
