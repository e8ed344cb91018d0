//! Acquisition engine: collection, latest-round discovery, and the
//! top-level analysis pipeline with its phase machine.

pub mod collector;
pub mod discovery;
pub mod pipeline;
pub mod progress;

use serde::Serialize;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Linear escalation: the n-th retry waits `base × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn linear(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before retry `attempt` (1-based). Attempt 0 waits nothing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }
}

// ---------------------------------------------------------------------------
// Phase machine
// ---------------------------------------------------------------------------

/// Where an analysis run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Fetching,
    RetryingFailed,
    Analyzing,
    Done,
    Failed,
}

/// What happened in the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A new attempt begins.
    Start,
    /// Failed rounds remain and another retry wave is scheduled.
    RetryScheduled,
    /// Collection met its quota.
    Collected,
    /// Collection ended below quota.
    QuotaMissed,
    /// Snapshot produced.
    Analyzed,
    /// The attempt failed for any other reason.
    Abort,
}

impl Phase {
    /// Next phase, or `None` if `event` is illegal here.
    pub fn transition(self, event: PhaseEvent) -> Option<Phase> {
        use Phase::*;
        use PhaseEvent::*;

        match (self, event) {
            (Idle | Done | Failed, Start) => Some(Fetching),
            (Fetching | RetryingFailed, RetryScheduled) => Some(RetryingFailed),
            (Fetching | RetryingFailed, Collected) => Some(Analyzing),
            (Fetching | RetryingFailed, QuotaMissed) => Some(Failed),
            (Analyzing, Analyzed) => Some(Done),
            (Fetching | RetryingFailed | Analyzing, Abort) => Some(Failed),
            _ => None,
        }
    }

    /// No run is in flight.
    pub fn is_resting(self) -> bool {
        matches!(self, Phase::Idle | Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Fetching => write!(f, "fetching"),
            Phase::RetryingFailed => write!(f, "retrying_failed"),
            Phase::Analyzing => write!(f, "analyzing"),
            Phase::Done => write!(f, "done"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}
