//! Deadline timers driven by a host-supplied monotonic clock.
//!
//! Nothing here runs on its own: the host reports the current time and the
//! owner polls. This keeps timing deterministic under test and mirrors the
//! browser's single-threaded event loop.

use std::ops::Add;

/// Monotonic time in milliseconds, as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Millis(pub u64);

impl Add<u64> for Millis {
    type Output = Millis;

    fn add(self, rhs: u64) -> Millis {
        Millis(self.0.saturating_add(rhs))
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A one-shot timer with at most one pending deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Millis>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending deadline and schedule a new one `delay_ms` from
    /// `now`.
    pub fn rearm(&mut self, now: Millis, delay_ms: u64) {
        self.deadline = Some(now + delay_ms);
    }

    /// Drop the pending deadline without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// Returns `true` exactly once when the deadline has passed, disarming
    /// the timer.
    pub fn fire_if_due(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A repeating timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interval {
    next: Option<Millis>,
    period_ms: u64,
}

impl Interval {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start repeating every `period_ms`, first firing one period from `now`.
    pub fn start(&mut self, now: Millis, period_ms: u64) {
        self.period_ms = period_ms.max(1);
        self.next = Some(now + self.period_ms);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Fire at most once when a period has elapsed by `now`. Missed periods
    /// are dropped; the next one is scheduled a full period from `now`.
    pub fn fire_if_due(&mut self, now: Millis) -> bool {
        match self.next {
            Some(next) if now >= next => {
                self.next = Some(now + self.period_ms);
                true
            }
            _ => false,
        }
    }
}
