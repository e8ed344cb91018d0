//! Round-range collection with group retry and quota enforcement.
//!
//! One sweep over the requested range, then up to `max_retry_waves` passes
//! over whatever is still missing, each preceded by a longer wait. A single
//! round failing never aborts the run; only ending below the minimum does.

use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::progress::{ProgressEvent, ProgressReporter};
use super::Backoff;
use crate::config::CollectionConfig;
use crate::relay::RoundSource;
use crate::types::{DataSet, Draw, LottoError};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CollectionPolicy {
    /// Fetches issued concurrently per wave.
    pub wave_size: usize,
    /// Pause after every wave.
    pub pacing: Duration,
    pub max_retry_waves: u32,
    pub retry_backoff: Backoff,
}

impl CollectionPolicy {
    pub fn from_config(cfg: &CollectionConfig) -> Self {
        Self {
            wave_size: cfg.wave_size.max(1),
            pacing: cfg.pacing(),
            max_retry_waves: cfg.max_retry_waves,
            retry_backoff: Backoff::linear(cfg.retry_base_delay()),
        }
    }
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        Self::from_config(&CollectionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct CollectionOrchestrator<'a> {
    source: &'a dyn RoundSource,
    policy: CollectionPolicy,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> CollectionOrchestrator<'a> {
    pub fn new(
        source: &'a dyn RoundSource,
        policy: CollectionPolicy,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            source,
            policy,
            reporter,
        }
    }

    /// Collect `[start, end]`, failing only if fewer than `minimum` rounds
    /// could be fetched after every retry wave.
    pub async fn collect(
        &self,
        start: u32,
        end: u32,
        minimum: usize,
    ) -> Result<DataSet, LottoError> {
        let rounds: Vec<u32> = if start <= end {
            (start..=end).collect()
        } else {
            Vec::new()
        };
        let requested = rounds.len();

        info!(start, end, requested, minimum, "Starting collection");
        self.reporter
            .report(&ProgressEvent::CollectionStarted { start, end });

        let mut draws: Vec<Draw> = Vec::with_capacity(requested);
        let mut failed = self.fetch_batch(&rounds, &mut draws).await;

        let mut wave = 0;
        while !failed.is_empty() && wave < self.policy.max_retry_waves {
            wave += 1;
            let delay = self.policy.retry_backoff.delay_for(wave);
            info!(
                wave,
                max_waves = self.policy.max_retry_waves,
                remaining = failed.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying failed rounds"
            );
            self.reporter.report(&ProgressEvent::RetryWave {
                wave,
                max_waves: self.policy.max_retry_waves,
                remaining: failed.len(),
            });

            tokio::time::sleep(delay).await;
            failed = self.fetch_batch(&failed, &mut draws).await;
        }

        // Judge the quota on distinct rounds; a source may answer with the
        // wrong round.
        let dataset = DataSet::new(draws, requested);
        let collected = dataset.len();
        if collected < minimum {
            warn!(
                collected,
                requested,
                minimum,
                failed = ?failed,
                "Collection below minimum"
            );
            return Err(LottoError::InsufficientData {
                collected,
                requested,
                minimum,
            });
        }

        if collected < requested {
            warn!(collected, requested, failed = ?failed, "Partial collection");
            self.reporter.report(&ProgressEvent::PartialCollection {
                collected,
                requested,
            });
        }

        info!(
            rounds = dataset.len(),
            first = ?dataset.first_round(),
            last = ?dataset.last_round(),
            "Collection complete"
        );
        Ok(dataset)
    }

    /// Fetch `rounds` in waves, appending successes to `draws`. Returns the
    /// rounds that came back empty, in request order.
    async fn fetch_batch(&self, rounds: &[u32], draws: &mut Vec<Draw>) -> Vec<u32> {
        let total = rounds.len();
        let mut failed = Vec::new();
        let mut settled = 0usize;

        for wave in rounds.chunks(self.policy.wave_size) {
            let results = join_all(wave.iter().map(|&round| async move {
                (round, self.source.fetch_round(round).await)
            }))
            .await;

            for (round, result) in results {
                settled += 1;
                let ok = result.is_some();
                match result {
                    Some(draw) => {
                        debug!(round, numbers = ?draw.numbers(), "Round collected");
                        draws.push(draw);
                    }
                    None => {
                        debug!(round, "Round missing");
                        failed.push(round);
                    }
                }
                self.reporter.report(&ProgressEvent::RoundSettled {
                    round,
                    ok,
                    percent: percent(settled, total),
                });
            }

            tokio::time::sleep(self.policy.pacing).await;
        }

        failed
    }
}

/// Rounded percentage, 100 for an empty batch.
fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done * 100 + total / 2) / total) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
