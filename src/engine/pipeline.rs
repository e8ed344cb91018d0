//! Top-level analysis pipeline.
//!
//! Owns the session (phase, last snapshot, last error, progress message)
//! and the in-flight guard. One run is: probe → resolve latest round →
//! collect the window → analyse, retried as a whole with a growing pause
//! until it succeeds or the attempt budget is spent.

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::collector::{CollectionOrchestrator, CollectionPolicy};
use super::discovery::LatestRoundLocator;
use super::progress::{LogReporter, ProgressEvent, ProgressReporter};
use super::{Backoff, Phase, PhaseEvent};
use crate::analysis::{AnalysisSnapshot, FrequencyAnalyzer};
use crate::config::{AppConfig, CollectionConfig, PipelineConfig};
use crate::relay::RoundSource;
use crate::strategy::{RecommendationEngine, StrategyResult};
use crate::types::{DataSet, LottoError};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Outcome of the last successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub attempts: u32,
    pub rounds: usize,
    pub requested: usize,
    pub partial: bool,
    pub first_round: Option<u32>,
    pub last_round: Option<u32>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    phase: Phase,
    snapshot: Option<Arc<AnalysisSnapshot>>,
    dataset: Option<Arc<DataSet>>,
    last_error: Option<String>,
    last_message: Option<String>,
    summary: Option<RunSummary>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            snapshot: None,
            dataset: None,
            last_error: None,
            last_message: None,
            summary: None,
        }
    }
}

/// Read-only view of the session for callers and the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub phase: Phase,
    pub busy: bool,
    pub last_message: Option<String>,
    pub last_error: Option<String>,
    pub rounds: Option<usize>,
    pub last_run: Option<RunSummary>,
}

// ---------------------------------------------------------------------------
// Reentrancy guard
// ---------------------------------------------------------------------------

/// Proof that this caller owns the in-flight slot. Releases it on drop.
#[derive(Debug)]
pub struct RunPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct AnalysisPipeline {
    source: Arc<dyn RoundSource>,
    collection: CollectionConfig,
    settings: PipelineConfig,
    analyzer: FrequencyAnalyzer,
    engine: RecommendationEngine,
    reporter: Arc<dyn ProgressReporter>,
    in_flight: Arc<AtomicBool>,
    session: RwLock<Session>,
}

impl AnalysisPipeline {
    pub fn new(source: Arc<dyn RoundSource>, config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            source,
            collection: config.collection.clone(),
            settings: config.pipeline.clone(),
            analyzer: FrequencyAnalyzer::from_config(&config.analysis),
            engine: RecommendationEngine::from_config(&config.recommendation)?,
            reporter: Arc::new(LogReporter),
            in_flight: Arc::new(AtomicBool::new(false)),
            session: RwLock::new(Session::default()),
        })
    }

    /// Send progress somewhere other than the log.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    // -- Inbound operations --------------------------------------------------

    /// Run a full analysis, rejecting the call if one is already running.
    pub async fn request_analysis(&self) -> Result<Arc<AnalysisSnapshot>, LottoError> {
        let permit = self.try_begin()?;
        self.run(permit).await
    }

    /// Claim the in-flight slot without starting work.
    pub fn try_begin(&self) -> Result<RunPermit, LottoError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LottoError::AnalysisInProgress)?;
        Ok(RunPermit {
            flag: Arc::clone(&self.in_flight),
        })
    }

    /// Run with an already-claimed slot; the slot is released on return.
    pub async fn run(&self, permit: RunPermit) -> Result<Arc<AnalysisSnapshot>, LottoError> {
        let _permit = permit;
        let _abort = AbortOnDrop { pipeline: self };
        let run_id = Uuid::new_v4();
        let reporter = SessionReporter { pipeline: self };
        let max_attempts = self.settings.max_attempts.max(1);
        let backoff = Backoff::linear(self.settings.backoff_base());

        info!(%run_id, max_attempts, "Analysis requested");

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            self.apply(PhaseEvent::Start);
            reporter.report(&ProgressEvent::AttemptStarted {
                attempt,
                max_attempts,
            });

            match self.attempt(&reporter).await {
                Ok(done) => break Ok(done),
                Err(err) => {
                    if !self.phase().is_resting() {
                        self.apply(PhaseEvent::Abort);
                    }
                    if attempt >= max_attempts {
                        break Err(LottoError::AttemptsExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    let wait = backoff.delay_for(attempt);
                    warn!(%run_id, attempt, error = %err, wait_ms = wait.as_millis() as u64, "Attempt failed");
                    reporter.report(&ProgressEvent::AttemptFailed {
                        attempt,
                        max_attempts,
                        wait_secs: wait.as_secs(),
                        error: err.to_string(),
                    });
                    tokio::time::sleep(wait).await;
                }
            }
        };

        match outcome {
            Ok((dataset, snapshot)) => {
                let rounds = dataset.len();
                let summary = RunSummary {
                    run_id,
                    attempts: attempt,
                    rounds,
                    requested: dataset.requested(),
                    partial: dataset.is_partial(),
                    first_round: dataset.first_round(),
                    last_round: dataset.last_round(),
                    generated_at: Utc::now(),
                };
                let snapshot = Arc::new(snapshot);
                {
                    let mut session = self.write();
                    session.snapshot = Some(Arc::clone(&snapshot));
                    session.dataset = Some(Arc::new(dataset));
                    session.last_error = None;
                    session.summary = Some(summary);
                }
                info!(%run_id, rounds, attempts = attempt, "Analysis complete");
                reporter.report(&ProgressEvent::Completed { rounds });
                Ok(snapshot)
            }
            Err(err) => {
                error!(%run_id, attempts = attempt, error = %err, "Analysis failed");
                self.write().last_error = Some(err.to_string());
                reporter.report(&ProgressEvent::Failed {
                    attempts: attempt,
                    error: err.root_cause().to_string(),
                });
                Err(err)
            }
        }
    }

    /// Generate the configured batch from the last snapshot.
    pub fn request_recommendations<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<StrategyResult>, LottoError> {
        let snapshot = self.snapshot().ok_or(LottoError::StaleState)?;
        Ok(self.engine.generate_batch(&snapshot, rng))
    }

    // -- Read-only views -----------------------------------------------------

    pub fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.read().snapshot.clone()
    }

    pub fn dataset(&self) -> Option<Arc<DataSet>> {
        self.read().dataset.clone()
    }

    pub fn phase(&self) -> Phase {
        self.read().phase
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PipelineStatus {
        let session = self.read();
        PipelineStatus {
            phase: session.phase,
            busy: self.is_busy(),
            last_message: session.last_message.clone(),
            last_error: session.last_error.clone(),
            rounds: session.dataset.as_ref().map(|d| d.len()),
            last_run: session.summary.clone(),
        }
    }

    // -- Internals -----------------------------------------------------------

    async fn attempt(
        &self,
        reporter: &SessionReporter<'_>,
    ) -> Result<(DataSet, AnalysisSnapshot), LottoError> {
        if let Some(probe) = self.settings.probe_round {
            reporter.report(&ProgressEvent::Probing { round: probe });
            if self.source.fetch_round(probe).await.is_none() {
                return Err(LottoError::SourceUnreachable(format!(
                    "connection check on round {probe} failed"
                )));
            }
        }

        let end = match self.collection.end_round {
            Some(round) => round,
            None => {
                let locator = LatestRoundLocator::new(
                    self.collection.discovery_probes,
                    self.collection.discovery_pacing(),
                );
                locator
                    .locate(self.source.as_ref(), Local::now().date_naive())
                    .await
            }
        };
        reporter.report(&ProgressEvent::LatestRoundResolved { round: end });

        let window = self.collection.window.max(1);
        let start = end.saturating_sub(window - 1).max(1);
        let orchestrator = CollectionOrchestrator::new(
            self.source.as_ref(),
            CollectionPolicy::from_config(&self.collection),
            reporter,
        );

        let dataset = match orchestrator
            .collect(start, end, self.collection.minimum_rounds)
            .await
        {
            Ok(dataset) => dataset,
            Err(err) => {
                if matches!(err, LottoError::InsufficientData { .. }) {
                    self.apply(PhaseEvent::QuotaMissed);
                }
                return Err(err);
            }
        };

        self.apply(PhaseEvent::Collected);
        reporter.report(&ProgressEvent::Analyzing {
            rounds: dataset.len(),
        });
        let snapshot = self.analyzer.analyze(&dataset);
        self.apply(PhaseEvent::Analyzed);

        Ok((dataset, snapshot))
    }

    /// Feed `event` to the phase machine. Illegal transitions are logged and
    /// leave the phase untouched.
    fn apply(&self, event: PhaseEvent) {
        let changed = {
            let mut session = self.write();
            match session.phase.transition(event) {
                Some(next) => {
                    let changed = next != session.phase;
                    session.phase = next;
                    changed.then_some(next)
                }
                None => {
                    warn!(phase = %session.phase, ?event, "Rejected phase transition");
                    None
                }
            }
        };

        if let Some(phase) = changed {
            let event = ProgressEvent::PhaseChanged { phase };
            self.set_message(&event);
            self.reporter.report(&event);
        }
    }

    fn set_message(&self, event: &ProgressEvent) {
        self.write().last_message = Some(event.to_string());
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reporter handed to the stages of a run: keeps the session's last message
/// current, turns retry waves into phase changes and forwards everything to
/// the configured reporter.
struct SessionReporter<'a> {
    pipeline: &'a AnalysisPipeline,
}

impl ProgressReporter for SessionReporter<'_> {
    fn report(&self, event: &ProgressEvent) {
        if matches!(event, ProgressEvent::RetryWave { .. }) {
            self.pipeline.apply(PhaseEvent::RetryScheduled);
        }
        self.pipeline.set_message(event);
        self.pipeline.reporter.report(event);
    }
}

/// Fails the phase when a run future is dropped before it settles, so the
/// next `Start` is accepted. Declared after the permit so it drops first.
struct AbortOnDrop<'a> {
    pipeline: &'a AnalysisPipeline,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        let phase = self.pipeline.phase();
        if phase.is_resting() {
            return;
        }
        warn!(%phase, "Analysis cancelled mid-run");
        self.pipeline.write().last_error = Some("Analysis cancelled".to_string());
        self.pipeline.apply(PhaseEvent::Abort);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
