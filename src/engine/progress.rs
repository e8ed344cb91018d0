//! Progress side channel.
//!
//! The pipeline narrates what it is doing through `ProgressReporter`. This
//! is notification only: nothing reads the events back to make decisions.

use serde::Serialize;
use std::fmt;
#[cfg(test)]
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use super::Phase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    PhaseChanged { phase: Phase },
    AttemptStarted { attempt: u32, max_attempts: u32 },
    Probing { round: u32 },
    LatestRoundResolved { round: u32 },
    CollectionStarted { start: u32, end: u32 },
    RoundSettled { round: u32, ok: bool, percent: u32 },
    RetryWave { wave: u32, max_waves: u32, remaining: usize },
    PartialCollection { collected: usize, requested: usize },
    Analyzing { rounds: usize },
    AttemptFailed { attempt: u32, max_attempts: u32, wait_secs: u64, error: String },
    Completed { rounds: usize },
    Failed { attempts: u32, error: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::PhaseChanged { phase } => write!(f, "Phase: {phase}"),
            ProgressEvent::AttemptStarted { attempt, max_attempts } => {
                write!(f, "Analysis attempt {attempt}/{max_attempts}")
            }
            ProgressEvent::Probing { round } => {
                write!(f, "Checking connection (round {round})...")
            }
            ProgressEvent::LatestRoundResolved { round } => {
                write!(f, "Latest round: {round}")
            }
            ProgressEvent::CollectionStarted { start, end } => {
                write!(f, "Collecting rounds {start}-{end}...")
            }
            ProgressEvent::RoundSettled { round, ok, percent } => {
                let outcome = if *ok { "ok" } else { "failed" };
                write!(f, "Collecting data... {percent}% (round {round} {outcome})")
            }
            ProgressEvent::RetryWave { wave, max_waves, remaining } => {
                write!(f, "Re-fetching {remaining} failed rounds (retry {wave}/{max_waves})")
            }
            ProgressEvent::PartialCollection { collected, requested } => {
                write!(f, "Partial collection: {collected}/{requested} rounds")
            }
            ProgressEvent::Analyzing { rounds } => write!(f, "Analysing {rounds} rounds..."),
            ProgressEvent::AttemptFailed { attempt, max_attempts, wait_secs, error } => write!(
                f,
                "{error}. Retrying in {wait_secs}s ({attempt}/{max_attempts})"
            ),
            ProgressEvent::Completed { rounds } => {
                write!(f, "Analysis complete: {rounds} rounds analysed")
            }
            ProgressEvent::Failed { attempts, error } => {
                write!(f, "Analysis failed after {attempts} attempts: {error}")
            }
        }
    }
}

/// Receiver of progress notifications.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Emits every event as an `info` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, event: &ProgressEvent) {
        info!(progress = %event, "Progress");
    }
}

/// Forwards events into a tokio channel; a closed receiver is ignored.
pub struct ChannelReporter {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: &ProgressEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Buffers events in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_settled_message() {
        let e = ProgressEvent::RoundSettled { round: 1105, ok: true, percent: 45 };
        assert_eq!(e.to_string(), "Collecting data... 45% (round 1105 ok)");
    }

    #[test]
    fn test_attempt_failed_message() {
        let e = ProgressEvent::AttemptFailed {
            attempt: 1,
            max_attempts: 3,
            wait_secs: 3,
            error: "Data source unreachable: probe failed".into(),
        };
        assert_eq!(
            e.to_string(),
            "Data source unreachable: probe failed. Retrying in 3s (1/3)"
        );
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let e = ProgressEvent::RetryWave { wave: 2, max_waves: 3, remaining: 4 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "retry_wave");
        assert_eq!(json["remaining"], 4);
    }

    #[tokio::test]
    async fn test_channel_reporter_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ChannelReporter::new(tx);
        reporter.report(&ProgressEvent::Completed { rounds: 20 });
        assert_eq!(rx.recv().await, Some(ProgressEvent::Completed { rounds: 20 }));

        drop(rx);
        // Must not panic once the receiver is gone.
        reporter.report(&ProgressEvent::Completed { rounds: 20 });
    }

    #[test]
    fn test_recording_reporter() {
        let r = RecordingReporter::new();
        r.report(&ProgressEvent::Probing { round: 1000 });
        r.report(&ProgressEvent::LatestRoundResolved { round: 1150 });
        assert_eq!(r.events().len(), 2);
    }
}
