//! Mock round source for integration testing.
//!
//! Provides a deterministic `RoundSource` that serves every round up to a
//! configurable latest round, with controllable dead and flaky rounds. All
//! state is in-memory with no external dependencies.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use lotto_oracle::relay::RoundSource;
use lotto_oracle::types::Draw;

pub struct MockSource {
    latest: u32,
    latency: Duration,
    dead: Mutex<HashSet<u32>>,
    /// Remaining failures per round before it starts answering.
    flaky: Mutex<HashMap<u32, u32>>,
    offline: AtomicBool,
    calls: Mutex<Vec<u32>>,
}

impl MockSource {
    /// Serve rounds `1..=latest`.
    pub fn new(latest: u32) -> Self {
        Self {
            latest,
            latency: Duration::ZERO,
            dead: Mutex::new(HashSet::new()),
            flaky: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rounds that never answer.
    pub fn with_dead(self, rounds: impl IntoIterator<Item = u32>) -> Self {
        self.dead.lock().unwrap().extend(rounds);
        self
    }

    /// `round` fails `failures` times, then answers.
    pub fn with_flaky(self, round: u32, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(round, failures);
        self
    }

    /// Every fetch waits this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls_for(&self, round: u32) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&r| r == round).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// The draw the mock serves for `round`.
pub fn draw_for(round: u32) -> Draw {
    let base = (round % 39) as u8 + 1;
    Draw::new(
        round,
        "2024-01-01",
        [base, base + 1, base + 2, base + 3, base + 4, base + 5],
        45,
    )
    .unwrap()
}

#[async_trait]
impl RoundSource for MockSource {
    async fn fetch_round(&self, round: u32) -> Option<Draw> {
        self.calls.lock().unwrap().push(round);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.offline.load(Ordering::SeqCst) || round == 0 || round > self.latest {
            return None;
        }
        if self.dead.lock().unwrap().contains(&round) {
            return None;
        }
        if let Some(left) = self.flaky.lock().unwrap().get_mut(&round) {
            if *left > 0 {
                *left -= 1;
                return None;
            }
        }
        Some(draw_for(round))
    }
}
