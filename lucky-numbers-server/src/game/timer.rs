//! Round Timer
//!
//! Two cadences drive a table. The heartbeat is fast and non-authoritative:
//! it only triggers snapshot broadcasts. The round deadline is slow and
//! authoritative: reaching it is the only way a round resolves.
//!
//! Time is always injected (`now`), never read here.

use std::time::Duration;

use tokio::time::Instant;

/// Cadence settings shared by every table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTiming {
    /// Length of one Collecting phase.
    pub round_duration: Duration,
    /// Snapshot broadcast period.
    pub heartbeat_interval: Duration,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

/// Authoritative deadline of the current round.
#[derive(Debug, Clone)]
pub struct RoundTimer {
    round_duration: Duration,
    deadline: Option<Instant>,
}

impl RoundTimer {
    /// Create a stopped timer.
    pub fn new(round_duration: Duration) -> Self {
        Self {
            round_duration,
            deadline: None,
        }
    }

    /// Arm the first round. Returns its deadline.
    pub fn start(&mut self, now: Instant) -> Instant {
        let deadline = now + self.round_duration;
        self.deadline = Some(deadline);
        deadline
    }

    /// Deadline of the current round, if started.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Round duration.
    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    /// Whether the current round should resolve at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Move to the next round and return the instant it opened.
    ///
    /// Rounds stay on the original grid; a table that stalled past a whole
    /// round restarts the grid from `now` instead of resolving back-to-back.
    pub fn advance(&mut self, now: Instant) -> Instant {
        let opened_at = match self.deadline {
            Some(deadline) if deadline + self.round_duration > now => deadline,
            _ => now,
        };
        self.deadline = Some(opened_at + self.round_duration);
        opened_at
    }

    /// Whole seconds left in the round, rounded up. Zero when stopped or due.
    pub fn seconds_remaining(&self, now: Instant) -> u32 {
        let Some(deadline) = self.deadline else {
            return 0;
        };
        let left = deadline.saturating_duration_since(now);
        let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        secs.min(u32::MAX as u64) as u32
    }
}
