//! Latest-round discovery.
//!
//! Draws happen weekly since 2002-12-07, so the calendar gives a close
//! upper estimate of the newest round. The estimate is confirmed by probing
//! the source downwards until a round answers.

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::relay::RoundSource;

/// Date of round 1.
pub fn first_draw_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2002, 12, 7).unwrap_or_default()
}

/// Rounds subtracted from the estimate when no probe answers.
const FALLBACK_OFFSET: u32 = 5;

pub struct LatestRoundLocator {
    max_probes: u32,
    pacing: Duration,
}

impl LatestRoundLocator {
    pub fn new(max_probes: u32, pacing: Duration) -> Self {
        Self { max_probes, pacing }
    }

    /// Calendar estimate: whole weeks since round 1, plus one.
    pub fn estimate(today: NaiveDate) -> u32 {
        let days = (today - first_draw_date()).num_days().max(0);
        (days / 7) as u32 + 1
    }

    /// Newest round the source actually serves, as of `today`.
    pub async fn locate(&self, source: &dyn RoundSource, today: NaiveDate) -> u32 {
        let estimate = Self::estimate(today);
        debug!(estimate, "Estimated latest round");

        let floor = estimate.saturating_sub(self.max_probes);
        let mut round = estimate;
        while round > floor {
            if source.fetch_round(round).await.is_some() {
                info!(round, estimate, "Latest round confirmed");
                return round;
            }
            tokio::time::sleep(self.pacing).await;
            round -= 1;
        }

        let fallback = estimate.saturating_sub(FALLBACK_OFFSET).max(1);
        warn!(estimate, fallback, "No probe answered, using fallback round");
        fallback
    }
}
