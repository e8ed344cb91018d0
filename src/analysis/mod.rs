//! Frequency analysis over a collected data set.
//!
//! Pure and deterministic: the same data set always yields the same
//! snapshot. Everything the recommender and the outer UI need is computed
//! here in one pass.

use serde::{Serialize, Serializer};

use crate::config::AnalysisConfig;
use crate::types::{all_numbers, ColumnPartition, DataSet, POOL_SIZE};

// ---------------------------------------------------------------------------
// Frequency table
// ---------------------------------------------------------------------------

/// Occurrence count for each number 1..=45.
///
/// Serialises as a map from number to count, e.g. `{"1": 14, "2": 9, ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u32; POOL_SIZE],
}

impl FrequencyTable {
    pub fn from_dataset(dataset: &DataSet) -> Self {
        let mut counts = [0u32; POOL_SIZE];
        for draw in dataset.draws() {
            for &n in draw.numbers() {
                counts[(n - 1) as usize] += 1;
            }
        }
        Self { counts }
    }

    /// Count for `n`; zero for numbers off the ticket.
    pub fn get(&self, n: u8) -> u32 {
        match n {
            1..=45 => self.counts[(n - 1) as usize],
            _ => 0,
        }
    }

    /// `(number, count)` pairs in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        all_numbers().map(move |n| (n, self.get(n)))
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// A number together with how often it was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberFrequency {
    pub number: u8,
    pub frequency: u32,
}

/// Hot / cold / medium membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberClass {
    Hot,
    Cold,
    Medium,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub index: usize,
    pub first: u8,
    pub last: u8,
    pub total: u32,
    pub avg_per_round: f64,
    pub avg_per_number: f64,
}

/// How one round's numbers fell across the ticket columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundColumns {
    pub round: u32,
    pub date: String,
    pub numbers: [u8; 6],
    pub column_distribution: [u8; ColumnPartition::COUNT],
}

/// Rounds whose winning-number sum fell in each bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SumBuckets {
    /// ≤ 120
    pub low: usize,
    /// 121–150
    pub mid: usize,
    /// > 150
    pub high: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_rounds: usize,
    pub total_numbers: u32,
    pub most_frequent: NumberFrequency,
    pub least_frequent: NumberFrequency,
    pub average_frequency: f64,
    pub consecutive_rounds: usize,
    pub sum_buckets: SumBuckets,
    /// Index = number of odd winners in a round (0..=6).
    pub odd_histogram: [usize; 7],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    pub frequency: FrequencyTable,
    pub hot: Vec<NumberFrequency>,
    pub cold: Vec<NumberFrequency>,
    pub medium: Vec<u8>,
    pub columns: Vec<ColumnStats>,
    pub rounds: Vec<RoundColumns>,
    pub summary: SummaryStats,
}

impl AnalysisSnapshot {
    pub fn hot_numbers(&self) -> Vec<u8> {
        self.hot.iter().map(|h| h.number).collect()
    }

    pub fn cold_numbers(&self) -> Vec<u8> {
        self.cold.iter().map(|c| c.number).collect()
    }

    pub fn classify(&self, n: u8) -> NumberClass {
        if self.hot.iter().any(|h| h.number == n) {
            NumberClass::Hot
        } else if self.cold.iter().any(|c| c.number == n) {
            NumberClass::Cold
        } else {
            NumberClass::Medium
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct FrequencyAnalyzer {
    hot_threshold: u32,
    cold_threshold: u32,
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl FrequencyAnalyzer {
    pub fn new(hot_threshold: u32, cold_threshold: u32) -> Self {
        Self {
            hot_threshold,
            cold_threshold,
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.hot_threshold, cfg.cold_threshold)
    }

    pub fn analyze(&self, dataset: &DataSet) -> AnalysisSnapshot {
        let frequency = FrequencyTable::from_dataset(dataset);
        let total_rounds = dataset.len();

        // Count descending; ties keep ascending number order (stable sort).
        let mut by_count: Vec<NumberFrequency> = frequency
            .iter()
            .map(|(number, frequency)| NumberFrequency { number, frequency })
            .collect();
        by_count.sort_by(|a, b| b.frequency.cmp(&a.frequency));

        let hot: Vec<NumberFrequency> = by_count
            .iter()
            .filter(|nf| nf.frequency >= self.hot_threshold)
            .copied()
            .collect();
        let cold: Vec<NumberFrequency> = by_count
            .iter()
            .filter(|nf| nf.frequency <= self.cold_threshold)
            .copied()
            .collect();
        let medium: Vec<u8> = frequency
            .iter()
            .filter(|&(_, f)| f < self.hot_threshold && f > self.cold_threshold)
            .map(|(n, _)| n)
            .collect();

        let rounds: Vec<RoundColumns> = dataset
            .draws()
            .iter()
            .map(|d| RoundColumns {
                round: d.round(),
                date: d.date().to_string(),
                numbers: *d.numbers(),
                column_distribution: ColumnPartition::distribution(d.numbers()),
            })
            .collect();

        let columns = column_stats(&frequency, total_rounds);
        let summary = summarise(dataset, &frequency);

        AnalysisSnapshot {
            frequency,
            hot,
            cold,
            medium,
            columns,
            rounds,
            summary,
        }
    }
}

fn column_stats(frequency: &FrequencyTable, total_rounds: usize) -> Vec<ColumnStats> {
    (0..ColumnPartition::COUNT)
        .map(|index| {
            let members = ColumnPartition::members(index);
            let (first, last) = ColumnPartition::bounds(index);
            let width = members.clone().count();
            let total: u32 = members.map(|n| frequency.get(n)).sum();
            let avg_per_round = if total_rounds > 0 {
                total as f64 / total_rounds as f64
            } else {
                0.0
            };
            ColumnStats {
                index,
                first,
                last,
                total,
                avg_per_round,
                avg_per_number: total as f64 / width as f64,
            }
        })
        .collect()
}

fn summarise(dataset: &DataSet, frequency: &FrequencyTable) -> SummaryStats {
    let total_numbers = frequency.total();

    // First number to reach the extreme wins ties.
    let mut most = NumberFrequency { number: 1, frequency: frequency.get(1) };
    let mut least = most;
    for (number, count) in frequency.iter() {
        if count > most.frequency {
            most = NumberFrequency { number, frequency: count };
        }
        if count < least.frequency {
            least = NumberFrequency { number, frequency: count };
        }
    }

    let mut sum_buckets = SumBuckets::default();
    let mut odd_histogram = [0usize; 7];
    let mut consecutive_rounds = 0;
    for draw in dataset.draws() {
        match draw.sum() {
            0..=120 => sum_buckets.low += 1,
            121..=150 => sum_buckets.mid += 1,
            _ => sum_buckets.high += 1,
        }
        odd_histogram[draw.odd_count()] += 1;
        if draw.has_consecutive_pair() {
            consecutive_rounds += 1;
        }
    }

    SummaryStats {
        total_rounds: dataset.len(),
        total_numbers,
        most_frequent: most,
        least_frequent: least,
        average_frequency: total_numbers as f64 / POOL_SIZE as f64,
        consecutive_rounds,
        sum_buckets,
        odd_histogram,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
