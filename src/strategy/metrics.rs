//! Derived metrics attached to every generated ticket.

use serde::Serialize;

use crate::analysis::{AnalysisSnapshot, NumberClass};
use crate::types::{ColumnPartition, RangeDistribution, PICK_COUNT};

/// How many of a ticket's numbers fall in each frequency class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrequencyMix {
    pub hot: u8,
    pub cold: u8,
    pub medium: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedMetrics {
    pub odd_count: u8,
    pub even_count: u8,
    pub sum: u32,
    pub ranges: RangeDistribution,
    pub columns: [u8; ColumnPartition::COUNT],
    pub frequency_mix: FrequencyMix,
}

impl DerivedMetrics {
    pub fn compute(numbers: &[u8; PICK_COUNT], snapshot: &AnalysisSnapshot) -> Self {
        let odd_count = numbers.iter().filter(|&&n| n % 2 == 1).count() as u8;

        let mut frequency_mix = FrequencyMix::default();
        for &n in numbers {
            match snapshot.classify(n) {
                NumberClass::Hot => frequency_mix.hot += 1,
                NumberClass::Cold => frequency_mix.cold += 1,
                NumberClass::Medium => frequency_mix.medium += 1,
            }
        }

        Self {
            odd_count,
            even_count: PICK_COUNT as u8 - odd_count,
            sum: numbers.iter().map(|&n| n as u32).sum(),
            ranges: RangeDistribution::of(numbers),
            columns: ColumnPartition::distribution(numbers),
            frequency_mix,
        }
    }
}
