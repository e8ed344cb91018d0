//! Shared types for lotto-oracle.
//!
//! These types form the data model used across all modules: validated
//! draws, the immutable data set built from them, the fixed ticket column
//! layout, and the crate-wide error enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Smallest number on a 6/45 ticket.
pub const MIN_NUMBER: u8 = 1;

/// Largest number on a 6/45 ticket.
pub const MAX_NUMBER: u8 = 45;

/// Count of numbers on a ticket.
pub const POOL_SIZE: usize = MAX_NUMBER as usize;

/// Winning numbers per draw (bonus excluded).
pub const PICK_COUNT: usize = 6;

/// Whether `n` is a legal ticket number.
pub fn in_range(n: u8) -> bool {
    (MIN_NUMBER..=MAX_NUMBER).contains(&n)
}

/// Every ticket number, ascending.
pub fn all_numbers() -> RangeInclusive<u8> {
    MIN_NUMBER..=MAX_NUMBER
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

/// One historical lottery result.
///
/// Only constructible through [`Draw::new`], which enforces six distinct
/// in-range numbers and an in-range bonus. Numbers are kept ascending.
/// Deserialisation goes through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DrawRecord")]
pub struct Draw {
    round: u32,
    date: String,
    numbers: [u8; PICK_COUNT],
    bonus: u8,
}

/// Unchecked wire shape of a [`Draw`].
#[derive(Deserialize)]
struct DrawRecord {
    round: u32,
    #[serde(default)]
    date: String,
    numbers: [u8; PICK_COUNT],
    bonus: u8,
}

impl TryFrom<DrawRecord> for Draw {
    type Error = DrawError;

    fn try_from(r: DrawRecord) -> Result<Self, Self::Error> {
        Draw::new(r.round, r.date, r.numbers, r.bonus)
    }
}

impl Draw {
    pub fn new(
        round: u32,
        date: impl Into<String>,
        numbers: [u8; PICK_COUNT],
        bonus: u8,
    ) -> Result<Self, DrawError> {
        if round == 0 {
            return Err(DrawError::ZeroRound);
        }
        if let Some(&n) = numbers.iter().find(|&&n| !in_range(n)) {
            return Err(DrawError::OutOfRange(n));
        }
        if !in_range(bonus) {
            return Err(DrawError::OutOfRange(bonus));
        }

        let mut sorted = numbers;
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(DrawError::Duplicate);
        }

        Ok(Self {
            round,
            date: date.into(),
            numbers: sorted,
            bonus,
        })
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Draw date as published, `YYYY-MM-DD`. May be empty.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// The six winning numbers, ascending.
    pub fn numbers(&self) -> &[u8; PICK_COUNT] {
        &self.numbers
    }

    pub fn bonus(&self) -> u8 {
        self.bonus
    }

    /// Sum of the six winning numbers.
    pub fn sum(&self) -> u32 {
        self.numbers.iter().map(|&n| n as u32).sum()
    }

    /// Count of odd winning numbers.
    pub fn odd_count(&self) -> usize {
        self.numbers.iter().filter(|&&n| n % 2 == 1).count()
    }

    /// Whether two winning numbers are adjacent integers.
    pub fn has_consecutive_pair(&self) -> bool {
        self.numbers.windows(2).any(|w| w[1] == w[0] + 1)
    }
}

impl fmt::Display for Draw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nums: Vec<String> = self.numbers.iter().map(|n| n.to_string()).collect();
        write!(
            f,
            "#{} ({}) {} + {}",
            self.round,
            self.date,
            nums.join(" "),
            self.bonus
        )
    }
}

/// Why a candidate draw was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("round number must be at least 1")]
    ZeroRound,

    #[error("number {0} outside 1..=45")]
    OutOfRange(u8),

    #[error("winning numbers are not distinct")]
    Duplicate,
}

// ---------------------------------------------------------------------------
// DataSet
// ---------------------------------------------------------------------------

/// Validated draws, ascending by round with no repeated rounds.
///
/// Built once by the collector and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSet {
    draws: Vec<Draw>,
    requested: usize,
}

impl DataSet {
    /// Sort by round and collapse duplicate rounds (first one wins).
    pub fn new(mut draws: Vec<Draw>, requested: usize) -> Self {
        draws.sort_by_key(Draw::round);
        draws.dedup_by_key(|d| d.round());
        Self { draws, requested }
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Size of the round range the collector was asked for.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Fewer draws than requested rounds.
    pub fn is_partial(&self) -> bool {
        self.draws.len() < self.requested
    }

    pub fn first_round(&self) -> Option<u32> {
        self.draws.first().map(Draw::round)
    }

    pub fn last_round(&self) -> Option<u32> {
        self.draws.last().map(Draw::round)
    }
}

// ---------------------------------------------------------------------------
// Column partition
// ---------------------------------------------------------------------------

/// Fixed grouping of 1..=45 mirroring the paper ticket: six bands of seven
/// and a trailing band of three.
pub struct ColumnPartition;

impl ColumnPartition {
    pub const COUNT: usize = 7;

    const BANDS: [(u8, u8); Self::COUNT] = [
        (1, 7),
        (8, 14),
        (15, 21),
        (22, 28),
        (29, 35),
        (36, 42),
        (43, 45),
    ];

    /// Zero-based band index of `n`, or `None` when `n` is off the ticket.
    pub fn column_of(n: u8) -> Option<usize> {
        if !in_range(n) {
            return None;
        }
        Some(((n - 1) / 7) as usize)
    }

    /// Numbers belonging to band `index`.
    pub fn members(index: usize) -> RangeInclusive<u8> {
        let (lo, hi) = Self::BANDS[index];
        lo..=hi
    }

    /// Inclusive bounds of band `index`.
    pub fn bounds(index: usize) -> (u8, u8) {
        Self::BANDS[index]
    }

    /// Per-band counts for a set of numbers.
    pub fn distribution(numbers: &[u8]) -> [u8; Self::COUNT] {
        let mut dist = [0u8; Self::COUNT];
        for &n in numbers {
            if let Some(col) = Self::column_of(n) {
                dist[col] += 1;
            }
        }
        dist
    }
}

// ---------------------------------------------------------------------------
// Number thirds
// ---------------------------------------------------------------------------

/// Counts of numbers in the low (1–15), mid (16–30) and high (31–45) thirds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDistribution {
    pub low: u8,
    pub mid: u8,
    pub high: u8,
}

impl RangeDistribution {
    pub const LOW: RangeInclusive<u8> = 1..=15;
    pub const MID: RangeInclusive<u8> = 16..=30;
    pub const HIGH: RangeInclusive<u8> = 31..=45;

    pub fn of(numbers: &[u8]) -> Self {
        let mut dist = Self::default();
        for &n in numbers {
            if Self::LOW.contains(&n) {
                dist.low += 1;
            } else if Self::MID.contains(&n) {
                dist.mid += 1;
            } else if Self::HIGH.contains(&n) {
                dist.high += 1;
            }
        }
        dist
    }
}

impl fmt::Display for RangeDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.low, self.mid, self.high)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for lotto-oracle.
#[derive(Debug, thiserror::Error)]
pub enum LottoError {
    #[error("Transport error via {relay}: {message}")]
    Transport { relay: String, message: String },

    #[error("Malformed response via {relay}: {message}")]
    MalformedResponse { relay: String, message: String },

    #[error("Round {0} unavailable from every relay")]
    RoundUnavailable(u32),

    #[error(
        "Insufficient data: collected {collected}/{requested} rounds (minimum {minimum} required)"
    )]
    InsufficientData {
        collected: usize,
        requested: usize,
        minimum: usize,
    },

    #[error("No analysis available yet. Run an analysis before requesting recommendations.")]
    StaleState,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("Data source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Analysis failed after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        last: Box<LottoError>,
    },
}

impl LottoError {
    /// The innermost error, looking through `AttemptsExhausted`.
    pub fn root_cause(&self) -> &LottoError {
        match self {
            LottoError::AttemptsExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
