//! Fixed-window limiter entry.

use std::time::{Duration, Instant};

use super::policy::Policy;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The request used one slot of the current window.
    Admitted,
    /// The route has no registered policy; nothing was counted.
    Unlimited,
    /// The window's budget is spent.
    Rejected {
        /// Time until the window rolls over
        retry_after: Duration,
    },
}

impl Verdict {
    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Verdict::Rejected { .. })
    }

    /// Time to wait before retrying; zero when admitted.
    pub fn retry_after(&self) -> Duration {
        match self {
            Verdict::Rejected { retry_after } => *retry_after,
            _ => Duration::ZERO,
        }
    }
}

/// Requests admitted for one key in its current window.
///
/// A window that started at `window_start` is over once
/// `now - window_start >= window`. The next admission after that starts a
/// fresh window at `now` rather than at `window_start + window`.
#[derive(Debug, Clone)]
pub struct LimiterEntry {
    /// Admissions in the current window
    count: u64,
    /// When the current window started
    window_start: Instant,
}

impl LimiterEntry {
    /// Create an entry with no admissions yet.
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Apply one admission check at `now`.
    ///
    /// Callers must hold exclusive access for the whole call; the check and
    /// the increment are one step.
    pub fn admit(&mut self, policy: &Policy, now: Instant) -> Verdict {
        if self.count == 0 || self.is_expired(policy.window(), now) {
            self.count = 1;
            self.window_start = now;
            return Verdict::Admitted;
        }

        if self.count < policy.limit() {
            self.count += 1;
            return Verdict::Admitted;
        }

        Verdict::Rejected {
            retry_after: self.duration_until_reset(policy.window(), now),
        }
    }

    /// Whether the current window is over at `now`.
    pub fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// Whether the window ended more than `grace` before `now`.
    pub fn is_stale(&self, window: Duration, grace: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window.saturating_add(grace)
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, window: Duration, now: Instant) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// When the current window started.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}
