//! Pool-based ticket sampling.
//!
//! A plan is a list of `(pool, target)` quotas filled in order. Sampling is
//! uniform without replacement inside a pool and never repeats a number
//! already picked by an earlier quota. A pool that runs dry is topped up from
//! the whole ticket, and anything still missing at the end is filled the
//! same way.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{all_numbers, PICK_COUNT};

/// One quota in a sampling plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    pub pool: Vec<u8>,
    pub target: usize,
}

impl Quota {
    pub fn new(pool: impl IntoIterator<Item = u8>, target: usize) -> Self {
        Self {
            pool: pool.into_iter().collect(),
            target,
        }
    }
}

/// Fill `plan` and return six distinct ascending numbers.
pub fn sample_ticket<R: Rng + ?Sized>(plan: &[Quota], rng: &mut R) -> [u8; PICK_COUNT] {
    let mut chosen: Vec<u8> = Vec::with_capacity(PICK_COUNT);

    for quota in plan {
        let room = PICK_COUNT - chosen.len();
        let want = quota.target.min(room);
        if want == 0 {
            continue;
        }

        let taken = take_from(&quota.pool, want, &mut chosen, rng);
        if taken < want {
            take_from_all(want - taken, &mut chosen, rng);
        }
    }

    if chosen.len() < PICK_COUNT {
        take_from_all(PICK_COUNT - chosen.len(), &mut chosen, rng);
    }

    let mut ticket = [0u8; PICK_COUNT];
    ticket.copy_from_slice(&chosen[..PICK_COUNT]);
    ticket.sort_unstable();
    ticket
}

/// Move up to `count` unused members of `pool` into `chosen`.
fn take_from<R: Rng + ?Sized>(
    pool: &[u8],
    count: usize,
    chosen: &mut Vec<u8>,
    rng: &mut R,
) -> usize {
    let mut available: Vec<u8> = pool
        .iter()
        .copied()
        .filter(|n| !chosen.contains(n))
        .collect();
    available.shuffle(rng);

    let take = count.min(available.len());
    chosen.extend_from_slice(&available[..take]);
    take
}

fn take_from_all<R: Rng + ?Sized>(count: usize, chosen: &mut Vec<u8>, rng: &mut R) {
    let everything: Vec<u8> = all_numbers().collect();
    take_from(&everything, count, chosen, rng);
}
