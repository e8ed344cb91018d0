//! Relay routing and round sources.
//!
//! The remote results endpoint is reachable directly or through a handful
//! of public relays, any of which may be down or rate-limited at a given
//! moment. `RelayRouter` turns a round number into the ordered list of
//! requests worth trying; `RoundSource` is the abstraction the collector
//! drives, implemented over HTTP by [`fetcher::RoundFetcher`].

pub mod fetcher;
pub mod payload;

use async_trait::async_trait;

use crate::config::{RelayConfig, SourceConfig};
use crate::types::Draw;

/// Anything that can produce a validated draw for a round number.
///
/// `None` means every avenue was exhausted for this round; the reason has
/// already been logged by the implementor.
#[async_trait]
pub trait RoundSource: Send + Sync {
    async fn fetch_round(&self, round: u32) -> Option<Draw>;
}

// ---------------------------------------------------------------------------
// Request descriptors
// ---------------------------------------------------------------------------

/// One concrete request for one round through one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub relay: String,
    pub url: String,
    /// Field holding the real payload as a JSON string, when the relay wraps it.
    pub envelope: Option<String>,
}

impl RequestDescriptor {
    /// Whether the body needs a second decode pass.
    pub fn is_enveloped(&self) -> bool {
        self.envelope.is_some()
    }
}

/// How to reach the source through one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTemplate {
    pub name: String,
    pub prefix: String,
    pub encode_target: bool,
    pub envelope_field: Option<String>,
}

impl RelayTemplate {
    fn build(&self, target: &str) -> RequestDescriptor {
        let url = if self.encode_target {
            format!("{}{}", self.prefix, urlencoding::encode(target))
        } else {
            format!("{}{}", self.prefix, target)
        };
        RequestDescriptor {
            relay: self.name.clone(),
            url,
            envelope: self.envelope_field.clone(),
        }
    }
}

impl From<&RelayConfig> for RelayTemplate {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            prefix: cfg.prefix.clone(),
            encode_target: cfg.encode_target,
            envelope_field: cfg.envelope_field.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Ordered relay list for the results endpoint. Performs no I/O.
#[derive(Debug, Clone)]
pub struct RelayRouter {
    endpoint: String,
    relays: Vec<RelayTemplate>,
}

impl RelayRouter {
    pub fn new(endpoint: impl Into<String>, relays: Vec<RelayTemplate>) -> Self {
        Self {
            endpoint: endpoint.into(),
            relays,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self::new(
            cfg.endpoint.clone(),
            cfg.relays.iter().map(RelayTemplate::from).collect(),
        )
    }

    /// The un-relayed URL for `round`.
    pub fn target(&self, round: u32) -> String {
        format!("{}{}", self.endpoint, round)
    }

    /// Requests to try for `round`, in preference order.
    pub fn candidates(&self, round: u32) -> Vec<RequestDescriptor> {
        let target = self.target(round);
        self.relays.iter().map(|r| r.build(&target)).collect()
    }

    pub fn relay_names(&self) -> Vec<&str> {
        self.relays.iter().map(|r| r.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
