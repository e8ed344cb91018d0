//! lotto-oracle: Lotto 6/45 history collector and recommender.
//!
//! Entry point. Loads configuration, initialises structured logging and
//! either serves the Trigger API or runs a single analysis and prints the
//! snapshot and recommendations as JSON.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use lotto_oracle::analysis::AnalysisSnapshot;
use lotto_oracle::config::AppConfig;
use lotto_oracle::dashboard;
use lotto_oracle::engine::pipeline::AnalysisPipeline;
use lotto_oracle::relay::fetcher::RoundFetcher;
use lotto_oracle::strategy::StrategyResult;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// One-shot output.
#[derive(Serialize)]
struct Report<'a> {
    analysis: &'a AnalysisSnapshot,
    recommendations: Vec<StrategyResult>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("LOTTO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        window = cfg.collection.window,
        minimum = cfg.collection.minimum_rounds,
        relays = cfg.source.relays.len(),
        "lotto-oracle starting up"
    );

    let fetcher = RoundFetcher::from_config(&cfg.source)?;
    info!(relays = ?fetcher.router().relay_names(), "Relay chain ready");

    let pipeline = Arc::new(
        AnalysisPipeline::new(Arc::new(fetcher), &cfg).context("Failed to build pipeline")?,
    );

    if cfg.dashboard.enabled {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received");
        };
        return dashboard::serve(pipeline, cfg.dashboard.port, shutdown).await;
    }

    let snapshot = pipeline.request_analysis().await?;

    let mut rng = match cfg.recommendation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let recommendations = pipeline.request_recommendations(&mut rng)?;

    let report = Report {
        analysis: &snapshot,
        recommendations,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOTTO_LOG_JSON` switches to
/// JSON lines.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lotto_oracle=info"));

    let json_logging = std::env::var("LOTTO_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
