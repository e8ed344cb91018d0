//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has serde defaults, so an empty file (or a missing section) yields
//! the stock behaviour: four relays, a 20-round window with a 15-round
//! minimum, three retry waves and three analysis attempts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::strategy::Strategy;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub collection: CollectionConfig,
    pub pipeline: PipelineConfig,
    pub analysis: AnalysisConfig,
    pub recommendation: RecommendationConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// Per-round endpoint; the round number is appended verbatim.
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Tried in order for every round.
    pub relays: Vec<RelayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub name: String,
    /// Prepended to the target URL. Empty for a direct request.
    #[serde(default)]
    pub prefix: String,
    /// Percent-encode the target URL before appending it.
    #[serde(default)]
    pub encode_target: bool,
    /// Field holding the real payload as a JSON string, if the relay wraps it.
    #[serde(default)]
    pub envelope_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectionConfig {
    /// Number of most recent rounds to analyse.
    pub window: u32,
    pub minimum_rounds: usize,
    /// Pin the newest round instead of discovering it.
    pub end_round: Option<u32>,
    /// Fetches issued concurrently per wave.
    pub wave_size: usize,
    pub pacing_ms: u64,
    pub max_retry_waves: u32,
    pub retry_base_delay_ms: u64,
    pub discovery_probes: u32,
    pub discovery_pacing_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Round fetched as a connectivity check before each attempt.
    pub probe_round: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub hot_threshold: u32,
    pub cold_threshold: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Strategy names, one result per entry.
    pub strategies: Vec<String>,
    pub max_attempts: u32,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_ENDPOINT: &str =
    "https://www.dhlottery.co.kr/common.do?method=getLottoNumber&drwNo=";

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 10,
            user_agent: "lotto-oracle/0.1.0".to_string(),
            relays: RelayConfig::defaults(),
        }
    }
}

impl RelayConfig {
    /// Direct request first, then the three public relays.
    pub fn defaults() -> Vec<Self> {
        vec![
            RelayConfig {
                name: "direct".to_string(),
                prefix: String::new(),
                encode_target: false,
                envelope_field: None,
            },
            RelayConfig {
                name: "allorigins".to_string(),
                prefix: "https://api.allorigins.win/get?url=".to_string(),
                encode_target: true,
                envelope_field: Some("contents".to_string()),
            },
            RelayConfig {
                name: "thingproxy".to_string(),
                prefix: "https://thingproxy.freeboard.io/fetch/".to_string(),
                encode_target: false,
                envelope_field: None,
            },
            RelayConfig {
                name: "cors-proxy".to_string(),
                prefix: "https://cors-proxy.htmldriven.com/?url=".to_string(),
                encode_target: true,
                envelope_field: None,
            },
        ]
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            window: 20,
            minimum_rounds: 15,
            end_round: None,
            wave_size: 1,
            pacing_ms: 400,
            max_retry_waves: 3,
            retry_base_delay_ms: 2000,
            discovery_probes: 30,
            discovery_pacing_ms: 300,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 3000,
            probe_round: Some(1000),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hot_threshold: 3,
            cold_threshold: 1,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            strategies: Strategy::default_lineup()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            max_attempts: 10,
            seed: None,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl CollectionConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn discovery_pacing(&self) -> Duration {
        Duration::from_millis(self.discovery_pacing_ms)
    }
}

impl PipelineConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RecommendationConfig {
    /// Resolve the configured names into strategies.
    pub fn lineup(&self) -> Result<Vec<Strategy>> {
        self.strategies
            .iter()
            .map(|name| {
                name.parse::<Strategy>()
                    .with_context(|| format!("Invalid strategy in config: {name}"))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.source.relays.is_empty() {
            bail!("source.relays must list at least one relay");
        }
        if self.collection.window == 0 {
            bail!("collection.window must be at least 1");
        }
        if self.collection.minimum_rounds > self.collection.window as usize {
            bail!(
                "collection.minimum_rounds ({}) exceeds collection.window ({})",
                self.collection.minimum_rounds,
                self.collection.window
            );
        }
        if self.collection.wave_size == 0 {
            bail!("collection.wave_size must be at least 1");
        }
        if self.pipeline.max_attempts == 0 {
            bail!("pipeline.max_attempts must be at least 1");
        }
        if self.analysis.hot_threshold <= self.analysis.cold_threshold {
            bail!(
                "analysis.hot_threshold ({}) must exceed analysis.cold_threshold ({})",
                self.analysis.hot_threshold,
                self.analysis.cold_threshold
            );
        }
        if self.recommendation.max_attempts == 0 {
            bail!("recommendation.max_attempts must be at least 1");
        }
        self.recommendation.lineup()?;
        Ok(())
    }
}
