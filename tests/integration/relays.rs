//! The HTTP fetcher against fake relays served by an in-process axum app.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use lotto_oracle::config::{AppConfig, RelayConfig, SourceConfig};
use lotto_oracle::engine::pipeline::AnalysisPipeline;
use lotto_oracle::relay::fetcher::RoundFetcher;
use lotto_oracle::relay::RoundSource;
use lotto_oracle::types::LottoError;

use crate::mock_source::draw_for;

// ---------------------------------------------------------------------------
// Fake relays
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeRelays {
    latest: u32,
    /// Rounds the direct endpoint answers with `returnValue: fail`.
    direct_missing: HashSet<u32>,
    direct_hits: AtomicU32,
    wrap_hits: AtomicU32,
    broken_hits: AtomicU32,
}

type Shared = Arc<FakeRelays>;

fn payload(round: u32) -> serde_json::Value {
    let d = draw_for(round);
    serde_json::json!({
        "returnValue": "success",
        "drwNo": round,
        "drwNoDate": d.date(),
        "drwtNo1": d.numbers()[0],
        "drwtNo2": d.numbers()[1],
        "drwtNo3": d.numbers()[2],
        "drwtNo4": d.numbers()[3],
        "drwtNo5": d.numbers()[4],
        "drwtNo6": d.numbers()[5],
        "bnusNo": d.bonus(),
    })
}

fn round_from(params: &HashMap<String, String>) -> Option<u32> {
    params.get("drwNo").and_then(|n| n.parse().ok())
}

/// The source endpoint itself.
async fn direct(
    State(relays): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    relays.direct_hits.fetch_add(1, Ordering::SeqCst);
    match round_from(&params) {
        Some(round) if round <= relays.latest && !relays.direct_missing.contains(&round) => {
            Json(payload(round))
        }
        _ => Json(serde_json::json!({ "returnValue": "fail" })),
    }
}

/// An allorigins-style relay: the body arrives as a string under `contents`.
async fn wrap(
    State(relays): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    relays.wrap_hits.fetch_add(1, Ordering::SeqCst);
    let round = params
        .get("url")
        .and_then(|url| url.rsplit("drwNo=").next())
        .and_then(|n| n.parse::<u32>().ok());

    match round {
        Some(round) if round <= relays.latest => {
            let contents = payload(round).to_string();
            Json(serde_json::json!({ "contents": contents, "status": { "http_code": 200 } }))
                .into_response()
        }
        _ => StatusCode::BAD_GATEWAY.into_response(),
    }
}

/// A relay that answers 200 with an HTML block page.
async fn broken(State(relays): State<Shared>) -> Html<&'static str> {
    relays.broken_hits.fetch_add(1, Ordering::SeqCst);
    Html("<html><body>Access denied</body></html>")
}

async fn spawn_relays(relays: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/round", get(direct))
        .route("/wrap", get(wrap))
        .route("/broken/*rest", get(broken))
        .with_state(relays);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn relay(name: &str, prefix: String, encode_target: bool, envelope: Option<&str>) -> RelayConfig {
    RelayConfig {
        name: name.to_string(),
        prefix,
        encode_target,
        envelope_field: envelope.map(str::to_string),
    }
}

fn source_config(addr: SocketAddr, relays: Vec<RelayConfig>) -> SourceConfig {
    SourceConfig {
        endpoint: format!("http://{addr}/round?drwNo="),
        request_timeout_secs: 5,
        relays,
        ..SourceConfig::default()
    }
}

fn direct_relay() -> RelayConfig {
    relay("direct", String::new(), false, None)
}

fn wrap_relay(addr: SocketAddr) -> RelayConfig {
    relay("wrapped", format!("http://{addr}/wrap?url="), true, Some("contents"))
}

fn broken_relay(addr: SocketAddr) -> RelayConfig {
    relay("broken", format!("http://{addr}/broken/"), false, None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_first_valid_relay_wins() {
    let relays = Arc::new(FakeRelays {
        latest: 50,
        ..FakeRelays::default()
    });
    let addr = spawn_relays(relays.clone()).await;
    let fetcher =
        RoundFetcher::from_config(&source_config(addr, vec![direct_relay(), wrap_relay(addr)]))
            .unwrap();

    let draw = fetcher.resolve(7).await.unwrap();
    assert_eq!(draw, draw_for(7));
    assert_eq!(relays.direct_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.wrap_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_direct_falls_through_to_enveloped_relay() {
    let relays = Arc::new(FakeRelays {
        latest: 50,
        direct_missing: HashSet::from([9]),
        ..FakeRelays::default()
    });
    let addr = spawn_relays(relays.clone()).await;
    let fetcher =
        RoundFetcher::from_config(&source_config(addr, vec![direct_relay(), wrap_relay(addr)]))
            .unwrap();

    let draw = fetcher.fetch_round(9).await.unwrap();
    assert_eq!(draw.numbers(), draw_for(9).numbers());
    assert_eq!(relays.direct_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.wrap_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_html_answer_is_skipped() {
    let relays = Arc::new(FakeRelays {
        latest: 50,
        ..FakeRelays::default()
    });
    let addr = spawn_relays(relays.clone()).await;
    let fetcher =
        RoundFetcher::from_config(&source_config(addr, vec![broken_relay(addr), wrap_relay(addr)]))
            .unwrap();

    let draw = fetcher.resolve(12).await.unwrap();
    assert_eq!(draw.round(), 12);
    assert_eq!(relays.broken_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.wrap_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.direct_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_round_unavailable_when_every_relay_fails() {
    let relays = Arc::new(FakeRelays {
        latest: 50,
        ..FakeRelays::default()
    });
    let addr = spawn_relays(relays.clone()).await;
    let fetcher = RoundFetcher::from_config(&source_config(
        addr,
        vec![direct_relay(), broken_relay(addr), wrap_relay(addr)],
    ))
    .unwrap();

    let err = fetcher.resolve(51).await.unwrap_err();
    assert!(matches!(err, LottoError::RoundUnavailable(51)));
    assert_eq!(relays.direct_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.broken_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relays.wrap_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_pipeline_over_http() {
    let relays = Arc::new(FakeRelays {
        latest: 40,
        direct_missing: HashSet::from([25, 33]),
        ..FakeRelays::default()
    });
    let addr = spawn_relays(relays.clone()).await;

    let mut cfg = AppConfig::default();
    cfg.source = source_config(addr, vec![direct_relay(), wrap_relay(addr)]);
    cfg.collection.end_round = Some(40);
    cfg.collection.pacing_ms = 0;
    cfg.collection.retry_base_delay_ms = 0;
    cfg.pipeline.probe_round = Some(10);

    let fetcher = RoundFetcher::from_config(&cfg.source).unwrap();
    let pipeline = AnalysisPipeline::new(Arc::new(fetcher), &cfg).unwrap();

    let snap = pipeline.request_analysis().await.unwrap();
    assert_eq!(snap.summary.total_rounds, 20);
    assert_eq!(snap.frequency.total(), 120);

    let dataset = pipeline.dataset().unwrap();
    assert_eq!(dataset.first_round(), Some(21));
    assert_eq!(dataset.last_round(), Some(40));
    assert!(!dataset.is_partial());

    // Probe plus the window went direct; two rounds needed the relay.
    assert_eq!(relays.direct_hits.load(Ordering::SeqCst), 21);
    assert_eq!(relays.wrap_hits.load(Ordering::SeqCst), 2);
}
