//! Pipeline scenarios over the mock source.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use lotto_oracle::config::AppConfig;
use lotto_oracle::engine::discovery::LatestRoundLocator;
use lotto_oracle::engine::pipeline::AnalysisPipeline;
use lotto_oracle::engine::progress::{ChannelReporter, ProgressEvent};
use lotto_oracle::engine::Phase;
use lotto_oracle::types::LottoError;

use crate::mock_source::MockSource;

/// Window 101..=120 with no waiting anywhere.
fn fast_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.collection.end_round = Some(120);
    cfg.collection.pacing_ms = 0;
    cfg.collection.retry_base_delay_ms = 0;
    cfg.collection.discovery_pacing_ms = 0;
    cfg.pipeline.backoff_base_ms = 0;
    cfg.pipeline.probe_round = None;
    cfg
}

fn pipeline(source: &Arc<MockSource>, cfg: &AppConfig) -> AnalysisPipeline {
    AnalysisPipeline::new(source.clone(), cfg).unwrap()
}

#[tokio::test]
async fn test_six_dead_rounds_fail_the_run() {
    let dead = [101, 104, 108, 112, 116, 120];
    let source = Arc::new(MockSource::new(200).with_dead(dead));
    let p = pipeline(&source, &fast_config());

    let err = assert_err!(p.request_analysis().await);
    match err.root_cause() {
        LottoError::InsufficientData {
            collected,
            requested,
            minimum,
        } => assert_eq!((*collected, *requested, *minimum), (14, 20, 15)),
        other => panic!("unexpected root cause: {other}"),
    }
    assert!(matches!(err, LottoError::AttemptsExhausted { attempts: 3, .. }));

    // Sweep plus three retry waves, in each of three attempts.
    assert_eq!(source.calls_for(104), 12);
    assert_eq!(source.calls_for(105), 3);

    assert_eq!(p.phase(), Phase::Failed);
    assert!(!p.is_busy());
    assert!(p.snapshot().is_none());

    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(
        p.request_recommendations(&mut rng),
        Err(LottoError::StaleState)
    ));
}

#[tokio::test]
async fn test_flaky_round_recovered_within_attempt() {
    let source = Arc::new(MockSource::new(200).with_flaky(110, 2));
    let p = pipeline(&source, &fast_config());

    let snap = assert_ok!(p.request_analysis().await);
    assert_eq!(snap.summary.total_rounds, 20);

    let run = p.status().last_run.unwrap();
    assert_eq!(run.attempts, 1);
    assert!(!run.partial);
    assert_eq!(source.calls_for(110), 3);
}

#[tokio::test]
async fn test_partial_collection_still_analysed() {
    let source = Arc::new(MockSource::new(200).with_dead([102, 111, 119]));
    let p = pipeline(&source, &fast_config());

    let snap = assert_ok!(p.request_analysis().await);
    assert_eq!(snap.summary.total_rounds, 17);
    assert_eq!(snap.frequency.total(), 17 * 6);

    let run = p.status().last_run.unwrap();
    assert!(run.partial);
    assert_eq!((run.rounds, run.requested), (17, 20));
}

#[tokio::test]
async fn test_latest_round_discovered_when_not_pinned() {
    let today = chrono::Local::now().date_naive();
    let latest = LatestRoundLocator::estimate(today) - 3;
    let source = Arc::new(MockSource::new(latest));

    let mut cfg = fast_config();
    cfg.collection.end_round = None;
    let p = pipeline(&source, &cfg);

    assert_ok!(p.request_analysis().await);
    let dataset = p.dataset().unwrap();
    assert_eq!(dataset.last_round(), Some(latest));
    assert_eq!(dataset.first_round(), Some(latest - 19));
}

#[tokio::test]
async fn test_probe_failure_reported_as_unreachable() {
    let source = Arc::new(MockSource::new(200));
    source.set_offline(true);

    let mut cfg = fast_config();
    cfg.pipeline.probe_round = Some(100);
    let p = pipeline(&source, &cfg);

    let err = assert_err!(p.request_analysis().await);
    assert!(matches!(err.root_cause(), LottoError::SourceUnreachable(_)));
    assert_eq!(source.total_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_request_rejected() {
    let source = Arc::new(MockSource::new(200).with_latency(Duration::from_millis(50)));
    let p = pipeline(&source, &fast_config());

    let (first, second) = tokio::join!(p.request_analysis(), p.request_analysis());

    assert_ok!(first);
    assert!(matches!(second, Err(LottoError::AnalysisInProgress)));
    assert!(!p.is_busy());
    assert_eq!(p.phase(), Phase::Done);
}

#[tokio::test]
async fn test_recommendations_after_analysis() {
    let source = Arc::new(MockSource::new(200));
    let p = pipeline(&source, &fast_config());
    assert_ok!(p.request_analysis().await);

    let calls_before = source.total_calls();
    let a = p.request_recommendations(&mut StdRng::seed_from_u64(2024)).unwrap();
    let b = p.request_recommendations(&mut StdRng::seed_from_u64(2024)).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.len(), 10);
    for (i, r) in a.iter().enumerate() {
        assert_eq!(r.id, i + 1);
        assert!(r.numbers.windows(2).all(|w| w[0] < w[1]));
        assert!(r.numbers.iter().all(|&n| (1..=45).contains(&n)));
    }
    // Recommendations never touch the network.
    assert_eq!(source.total_calls(), calls_before);
}

#[tokio::test]
async fn test_progress_streamed_over_channel() {
    let source = Arc::new(MockSource::new(200).with_dead([115]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let p = pipeline(&source, &fast_config()).with_reporter(Arc::new(ChannelReporter::new(tx)));

    assert_ok!(p.request_analysis().await);
    drop(p);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(events.contains(&ProgressEvent::CollectionStarted { start: 101, end: 120 }));
    assert!(events.contains(&ProgressEvent::RetryWave {
        wave: 1,
        max_waves: 3,
        remaining: 1
    }));
    assert!(events.contains(&ProgressEvent::PartialCollection {
        collected: 19,
        requested: 20
    }));
    assert_eq!(events.last(), Some(&ProgressEvent::Completed { rounds: 19 }));

    let settled = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::RoundSettled { .. }))
        .count();
    // 20 in the sweep, then the dead round once per retry wave.
    assert_eq!(settled, 23);
}
