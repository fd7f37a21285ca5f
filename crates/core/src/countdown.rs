//! Per-second countdown for a timed assessment.
//!
//! The countdown is driven externally: whoever owns the event loop calls
//! [`Countdown::tick`] once per second. It never reads the wall clock, so it stays
//! deterministic under test and tolerant of suspended timers.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
    Expired,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The countdown decremented and still has time left.
    Remaining(u32),
    /// This tick consumed the last second. Reported exactly once.
    Expired,
    /// The countdown is not running; nothing changed.
    Ignored,
}

/// Monotonic countdown measured in whole seconds.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    total_secs: u32,
    remaining_secs: u32,
    phase: Phase,
}

impl Countdown {
    /// Create an idle countdown of `total_secs` seconds.
    #[must_use]
    pub fn new(total_secs: u32) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
            phase: Phase::Idle,
        }
    }

    /// Create an idle countdown from an assessment duration in minutes.
    #[must_use]
    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(minutes.saturating_mul(60))
    }

    /// Begin ticking. Has no effect unless the countdown is idle.
    pub fn start(&mut self) {
        if self.phase == Phase::Idle {
            self.phase = Phase::Running;
        }
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::Running {
            return Tick::Ignored;
        }

        if self.remaining_secs <= 1 {
            self.remaining_secs = 0;
            self.phase = Phase::Expired;
            return Tick::Expired;
        }

        self.remaining_secs -= 1;
        Tick::Remaining(self.remaining_secs)
    }

    /// Stop ticking. Subsequent ticks are ignored until [`Countdown::resume`].
    pub fn stop(&mut self) {
        if self.phase == Phase::Running {
            self.phase = Phase::Stopped;
        }
    }

    /// Resume a stopped countdown. An expired countdown never resumes.
    pub fn resume(&mut self) {
        if self.phase == Phase::Stopped && self.remaining_secs > 0 {
            self.phase = Phase::Running;
        }
    }

    #[must_use]
    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.phase == Phase::Expired
    }

    /// Remaining time as `MM:SS`. Minutes are not capped at 59.
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_secs / 60,
            self.remaining_secs % 60
        )
    }
}

impl fmt::Debug for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Countdown")
            .field("total_secs", &self.total_secs)
            .field("remaining_secs", &self.remaining_secs)
            .field("phase", &self.phase)
            .finish()
    }
}
