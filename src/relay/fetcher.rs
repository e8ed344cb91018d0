//! HTTP round fetcher.
//!
//! Walks the relay candidates for a round in order and returns the first
//! well-formed draw. A failing relay is never retried for the same round;
//! repeated attempts are the collector's job.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::payload::decode_body;
use super::{RelayRouter, RequestDescriptor, RoundSource};
use crate::config::SourceConfig;
use crate::types::{Draw, LottoError};

pub struct RoundFetcher {
    http: Client,
    router: RelayRouter,
}

impl RoundFetcher {
    pub fn new(http: Client, router: RelayRouter) -> Self {
        Self { http, router }
    }

    /// Build a fetcher with its own client from the `[source]` section.
    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.request_timeout())
            .user_agent(cfg.user_agent.as_str())
            .build()
            .context("Failed to build round fetcher HTTP client")?;
        Ok(Self::new(http, RelayRouter::from_config(cfg)))
    }

    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Try every candidate in order; `RoundUnavailable` once all fail.
    pub async fn resolve(&self, round: u32) -> Result<Draw, LottoError> {
        for candidate in self.router.candidates(round) {
            match self.try_candidate(&candidate, round).await {
                Ok(draw) => {
                    debug!(round, relay = %candidate.relay, "Round fetched");
                    return Ok(draw);
                }
                Err(e) => {
                    debug!(round, relay = %candidate.relay, error = %e, "Relay attempt failed");
                }
            }
        }

        warn!(round, "Round unavailable from every relay");
        Err(LottoError::RoundUnavailable(round))
    }

    /// One request through one relay.
    async fn try_candidate(
        &self,
        candidate: &RequestDescriptor,
        round: u32,
    ) -> Result<Draw, LottoError> {
        let transport = |message: String| LottoError::Transport {
            relay: candidate.relay.clone(),
            message,
        };
        let malformed = |message: String| LottoError::MalformedResponse {
            relay: candidate.relay.clone(),
            message,
        };

        let resp = self
            .http
            .get(&candidate.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP {status}")));
        }

        let body = resp.text().await.map_err(|e| transport(e.to_string()))?;

        decode_body(&body, candidate.envelope.as_deref())
            .and_then(|payload| payload.into_draw(round))
            .map_err(|e| malformed(e.to_string()))
    }
}

#[async_trait]
impl RoundSource for RoundFetcher {
    async fn fetch_round(&self, round: u32) -> Option<Draw> {
        self.resolve(round).await.ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
