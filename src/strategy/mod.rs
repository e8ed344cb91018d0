//! Recommendation engine: strategy plans, ticket generation and in-batch
//! de-duplication.

pub mod metrics;
pub mod sampler;

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use tracing::{debug, warn};

use crate::analysis::AnalysisSnapshot;
use crate::config::RecommendationConfig;
use crate::types::{all_numbers, ColumnPartition, RangeDistribution, PICK_COUNT};
use metrics::DerivedMetrics;
use sampler::{sample_ticket, Quota};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A heuristic for picking six numbers from the frequency classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// 4 hot, 2 medium.
    HotFocused,
    /// 4 cold, 2 hot.
    ColdFocused,
    /// One from each of the first six columns.
    ColumnBalanced,
    /// 2 hot, 2 cold, 2 medium.
    Mixed1,
    /// 3 hot, 1 cold, 2 medium.
    Mixed2,
    MediumFocused,
    /// Two from each third of the ticket.
    RangeBalanced,
    /// 3 odd, 3 even.
    OddEvenBalanced,
    PureRandom,
}

impl Strategy {
    pub const ALL: [Strategy; 9] = [
        Strategy::HotFocused,
        Strategy::ColdFocused,
        Strategy::ColumnBalanced,
        Strategy::Mixed1,
        Strategy::Mixed2,
        Strategy::MediumFocused,
        Strategy::RangeBalanced,
        Strategy::OddEvenBalanced,
        Strategy::PureRandom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::HotFocused => "hot-focused",
            Strategy::ColdFocused => "cold-focused",
            Strategy::ColumnBalanced => "column-balanced",
            Strategy::Mixed1 => "mixed-1",
            Strategy::Mixed2 => "mixed-2",
            Strategy::MediumFocused => "medium-focused",
            Strategy::RangeBalanced => "range-balanced",
            Strategy::OddEvenBalanced => "odd-even-balanced",
            Strategy::PureRandom => "pure-random",
        }
    }

    /// The stock ten-ticket batch; pure-random appears twice.
    pub fn default_lineup() -> Vec<Strategy> {
        let mut lineup = Strategy::ALL.to_vec();
        lineup.push(Strategy::PureRandom);
        lineup
    }

    /// Quotas to fill, in order, for this strategy against `snapshot`.
    pub fn plan(self, snapshot: &AnalysisSnapshot) -> Vec<Quota> {
        let hot = || snapshot.hot_numbers();
        let cold = || snapshot.cold_numbers();
        let medium = || snapshot.medium.clone();

        match self {
            Strategy::HotFocused => vec![Quota::new(hot(), 4), Quota::new(medium(), 2)],
            Strategy::ColdFocused => vec![Quota::new(cold(), 4), Quota::new(hot(), 2)],
            Strategy::ColumnBalanced => (0..PICK_COUNT)
                .map(|i| Quota::new(ColumnPartition::members(i), 1))
                .collect(),
            Strategy::Mixed1 => vec![
                Quota::new(hot(), 2),
                Quota::new(cold(), 2),
                Quota::new(medium(), 2),
            ],
            Strategy::Mixed2 => vec![
                Quota::new(hot(), 3),
                Quota::new(cold(), 1),
                Quota::new(medium(), 2),
            ],
            Strategy::MediumFocused => vec![Quota::new(medium(), 6)],
            Strategy::RangeBalanced => vec![
                Quota::new(RangeDistribution::LOW, 2),
                Quota::new(RangeDistribution::MID, 2),
                Quota::new(RangeDistribution::HIGH, 2),
            ],
            Strategy::OddEvenBalanced => vec![
                Quota::new(all_numbers().filter(|n| n % 2 == 1), 3),
                Quota::new(all_numbers().filter(|n| n % 2 == 0), 3),
            ],
            Strategy::PureRandom => vec![Quota::new(all_numbers(), 6)],
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "random-1" | "random-2" | "random" => return Ok(Strategy::PureRandom),
            _ => {}
        }
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == name)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One recommended ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyResult {
    /// 1-based position in the batch.
    pub id: usize,
    pub strategy: Strategy,
    pub numbers: [u8; PICK_COUNT],
    pub metrics: DerivedMetrics,
    /// Generations needed to get past in-batch collisions.
    pub attempts: u32,
    /// Still collides with an earlier ticket after every attempt.
    pub duplicate: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RecommendationEngine {
    lineup: Vec<Strategy>,
    max_attempts: u32,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(Strategy::default_lineup(), 10)
    }
}

impl RecommendationEngine {
    pub fn new(lineup: Vec<Strategy>, max_attempts: u32) -> Self {
        Self {
            lineup,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(cfg: &RecommendationConfig) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.lineup()?, cfg.max_attempts))
    }

    pub fn lineup(&self) -> &[Strategy] {
        &self.lineup
    }

    /// A single ticket for `strategy`, outside any batch.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        strategy: Strategy,
        snapshot: &AnalysisSnapshot,
        rng: &mut R,
    ) -> StrategyResult {
        let numbers = sample_ticket(&strategy.plan(snapshot), rng);
        StrategyResult {
            id: 1,
            strategy,
            numbers,
            metrics: DerivedMetrics::compute(&numbers, snapshot),
            attempts: 1,
            duplicate: false,
        }
    }

    /// One ticket per lineup entry. A ticket equal to an earlier one is
    /// regenerated up to `max_attempts` times in total, then kept and
    /// flagged.
    pub fn generate_batch<R: Rng + ?Sized>(
        &self,
        snapshot: &AnalysisSnapshot,
        rng: &mut R,
    ) -> Vec<StrategyResult> {
        let mut seen: HashSet<[u8; PICK_COUNT]> = HashSet::with_capacity(self.lineup.len());
        let mut results = Vec::with_capacity(self.lineup.len());

        for (index, &strategy) in self.lineup.iter().enumerate() {
            let plan = strategy.plan(snapshot);
            let mut attempts = 1;
            let mut numbers = sample_ticket(&plan, rng);
            while seen.contains(&numbers) && attempts < self.max_attempts {
                attempts += 1;
                numbers = sample_ticket(&plan, rng);
            }

            let duplicate = !seen.insert(numbers);
            if duplicate {
                warn!(
                    strategy = %strategy,
                    attempts,
                    numbers = ?numbers,
                    "Accepting duplicate ticket"
                );
            } else {
                debug!(strategy = %strategy, attempts, numbers = ?numbers, "Ticket generated");
            }

            results.push(StrategyResult {
                id: index + 1,
                strategy,
                numbers,
                metrics: DerivedMetrics::compute(&numbers, snapshot),
                attempts,
                duplicate,
            });
        }

        results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
