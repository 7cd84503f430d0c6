// Fixed-window quota tracking.
//
// Perspective enforces a per-minute quota that resets entirely at the end
// of each window. QuotaWindow keeps the remaining permits and the instant
// the window rolls over. There is no timer driving the reset: the window
// is rolled over lazily whenever someone asks whether it is exhausted
// after the boundary has passed.
//
// Every operation takes an explicit `now` so the window can be driven by a
// fake clock. The `*_now` conveniences read tokio's clock, which honours
// `tokio::time::pause()` in tests.

use tokio::time::{Duration, Instant};

use crate::error::ConfigError;

/// Quota state for one fixed window.
#[derive(Debug, Clone)]
pub struct QuotaWindow {
    /// Length of a window.
    period: Duration,
    /// Permits granted at the start of each window.
    limit: u32,
    /// Permits left in the current window.
    remaining: u32,
    /// When the current window ends.
    reset_at: Instant,
}

impl QuotaWindow {
    /// Create a window allowing `limit` permits every `period`.
    ///
    /// The first window opens on the first exhaustion check, not here.
    pub fn new(limit: u32, period: Duration) -> Result<Self, ConfigError> {
        Self::new_at(limit, period, Instant::now())
    }

    /// Like [`QuotaWindow::new`] but with an explicit creation instant.
    pub fn new_at(limit: u32, period: Duration, now: Instant) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(Self {
            period,
            limit,
            remaining: limit,
            reset_at: now,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Permits left as of the last check. Stale once `reset_at` has passed.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn reset_at(&self) -> Instant {
        self.reset_at
    }

    /// Whether no permits are left at `now`.
    ///
    /// If the window has ended it is rolled over first (full permits, new
    /// window starting at `now`) and the answer is `false`.
    pub fn is_exhausted_at(&mut self, now: Instant) -> bool {
        if self.reset_at <= now {
            self.remaining = self.limit;
            self.reset_at = now + self.period;
            return false;
        }
        self.remaining == 0
    }

    pub fn is_exhausted(&mut self) -> bool {
        self.is_exhausted_at(Instant::now())
    }

    /// Take one permit. Only valid right after `is_exhausted*` returned false.
    pub fn debit(&mut self) {
        debug_assert!(self.remaining > 0, "debit on an exhausted quota window");
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Mark the quota as used up for a full period starting at `now`.
    ///
    /// Used after the server reports a quota violation, which usually means
    /// the configured limit is higher than the real one.
    pub fn force_block_at(&mut self, now: Instant) {
        self.remaining = 0;
        self.reset_at = now + self.period;
    }

    pub fn force_block(&mut self) {
        self.force_block_at(Instant::now());
    }

    /// Time left until the window rolls over, zero if it already has.
    pub fn time_until_reset(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}
