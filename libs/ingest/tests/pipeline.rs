use std::sync::Arc;
use std::time::Duration;

use ingest::{
    run, AckPolicy, Clock, DurableWriter, EventProcessor, IngestConfig, IngestError, ManualClock,
    PartitionResolver, ProcessOutcome, RestartPolicy, RetryPolicy, WriteKind,
};
use sink_api::{FaultOp, FsErrorKind, FsOp, MemoryFs, VecFeed};
use tokio_util::sync::CancellationToken;

const BASE: &str = "/user/savora/events";
// 2024-05-01T10:00:00Z
const NOW: i64 = 1_714_557_600;

fn processor(fs: &Arc<MemoryFs>) -> EventProcessor {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));
    EventProcessor::new(
        PartitionResolver::new(BASE),
        DurableWriter::new(fs.clone(), RetryPolicy::default(), clock.clone()),
        clock,
    )
}

#[tokio::test(start_paused = true)]
async fn restaurant_view_lands_in_bucket_and_user_file() {
    let fs = Arc::new(MemoryFs::new());
    let raw = br#"{"eventType":"RESTAURANT_VIEWED","timestamp":"2024-05-01T10:00:00Z","userId":"42","data":{"restaurantId":"r1"}}"#;

    let out = processor(&fs).process(raw).await;
    assert!(out.is_stored());

    let by_type = fs.lines(&format!("{BASE}/restaurant_view_events/2024-05-01.json"));
    let by_user = fs.lines(&format!("{BASE}/by_user/42/RESTAURANT_VIEWED_2024-05-01.json"));
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type, by_user);

    let stored: serde_json::Value = serde_json::from_str(&by_type[0]).unwrap();
    let sent: serde_json::Value = serde_json::from_slice(raw).unwrap();
    assert_eq!(stored, sent);
}

#[tokio::test(start_paused = true)]
async fn unknown_types_append_to_other_events_in_order() {
    let fs = Arc::new(MemoryFs::new());
    let p = processor(&fs);

    p.process(br#"{"eventType":"FOO","seq":1}"#).await;
    p.process(br#"{"eventType":"FOO","seq":2}"#).await;

    assert_eq!(
        fs.lines(&format!("{BASE}/other_events/2024-05-01.json")),
        vec![r#"{"eventType":"FOO","seq":1}"#, r#"{"eventType":"FOO","seq":2}"#]
    );
    assert_eq!(fs.file_paths().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lease_conflict_resolved_within_the_same_attempt() {
    let fs = Arc::new(MemoryFs::new());
    let path = format!("{BASE}/search_events/2024-05-01.json");
    fs.seed_file(&path, b"{\"n\":1}\n");
    fs.inject_fault(FaultOp::Append, &path, FsErrorKind::LeaseConflict, 1);

    let started = tokio::time::Instant::now();
    let out = processor(&fs)
        .process(br#"{"eventType":"SEARCH_PERFORMED","timestamp":"2024-05-01","n":2}"#)
        .await;

    let write = &out.writes()[0];
    assert_eq!(write.attempts.len(), 1);
    assert_eq!(write.kind(), Some(WriteKind::Rewritten));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(fs.lines(&path).len(), 2);
    assert!(fs.ops().contains(&FsOp::Create { path: path.clone(), overwrite: true }));
}

#[tokio::test(start_paused = true)]
async fn unreachable_fs_makes_five_attempts_then_one_fallback() {
    let fs = Arc::new(MemoryFs::new());
    fs.set_unreachable(true);
    let p = processor(&fs);

    let started = tokio::time::Instant::now();
    let out = p.process(br#"{"eventType":"CUISINE_SELECTED","timestamp":"2024-05-01"}"#).await;

    assert!(matches!(out, ProcessOutcome::Incomplete { .. }));
    let write = &out.writes()[0];
    assert_eq!(write.attempts.len(), 6);
    assert_eq!(write.resolved_path(), format!("{BASE}/cuisine_events/2024-05-01.json.{NOW}"));
    // 2 + 4 + 6 + 8 seconds between the five attempts.
    assert_eq!(started.elapsed(), Duration::from_secs(20));

    let fallback_creates = fs
        .ops()
        .iter()
        .filter(|op| matches!(op, FsOp::Create { overwrite: false, path } if path.ends_with(&format!(".{NOW}"))))
        .count();
    assert_eq!(fallback_creates, 1);

    fs.set_unreachable(false);
    let next = p.process(br#"{"eventType":"CUISINE_SELECTED","timestamp":"2024-05-01"}"#).await;
    assert!(next.is_stored());
}

#[tokio::test(start_paused = true)]
async fn every_successful_write_adds_exactly_one_line() {
    let fs = Arc::new(MemoryFs::new());
    let p = processor(&fs);

    for i in 0..25 {
        let raw = format!(r#"{{"eventType":"RESTAURANT_BOOKMARKED","timestamp":"2024-05-01T08:00:00Z","userId":"7","i":{i}}}"#);
        assert!(p.process(raw.as_bytes()).await.is_stored());
    }

    assert_eq!(fs.lines(&format!("{BASE}/bookmark_events/2024-05-01.json")).len(), 25);
    assert_eq!(fs.lines(&format!("{BASE}/by_user/7/RESTAURANT_BOOKMARKED_2024-05-01.json")).len(), 25);
}

#[tokio::test]
async fn run_provisions_then_consumes_until_feed_closes() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let broker = listener.local_addr().unwrap().to_string();

    let fs = Arc::new(MemoryFs::new());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));
    let mut cfg = IngestConfig::new(vec![broker], BASE);
    cfg.broker_wait = Duration::from_secs(5);

    let stats = run(
        &cfg,
        fs.clone(),
        clock,
        || {
            Ok(VecFeed::new(
                "user-events",
                vec![
                    br#"{"eventType":"SEARCH_PERFORMED","userId":"3"}"#.to_vec(),
                    b"not json".to_vec(),
                ],
            ))
        },
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.stored, 1);
    assert_eq!(stats.discarded, 1);
    for dir in [
        "cuisine_events",
        "dietary_events",
        "restaurant_view_events",
        "bookmark_events",
        "search_events",
        "other_events",
        "by_user",
    ] {
        assert!(fs.is_dir(&format!("{BASE}/{dir}")), "{dir} missing");
    }
    assert_eq!(fs.lines(&format!("{BASE}/search_events/2024-05-01.json")).len(), 1);
    assert_eq!(fs.lines(&format!("{BASE}/by_user/3/SEARCH_PERFORMED_2024-05-01.json")).len(), 1);
}

#[tokio::test]
async fn run_fails_fast_when_broker_never_answers() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let broker = listener.local_addr().unwrap().to_string();
    drop(listener);

    let fs = Arc::new(MemoryFs::new());
    let mut cfg = IngestConfig::new(vec![broker], BASE);
    cfg.broker_wait = Duration::ZERO;
    cfg.ack = AckPolicy::AfterWrite;
    cfg.restart = RestartPolicy { attempts: 1, delay: Duration::ZERO };

    let mut connected = false;
    let err = run(
        &cfg,
        fs.clone(),
        Arc::new(ManualClock::at(NOW)),
        || {
            connected = true;
            Ok(VecFeed::new("user-events", Vec::new()))
        },
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, IngestError::BrokerUnavailable { .. }));
    assert!(!connected);
    assert!(fs.ops().is_empty());
}

#[tokio::test]
async fn run_rejects_invalid_config() {
    let cfg = IngestConfig::new(vec!["kafka:9093".into()], "relative/path");
    let err = run(
        &cfg,
        Arc::new(MemoryFs::new()),
        Arc::new(ManualClock::at(NOW)),
        || Ok(VecFeed::new("user-events", Vec::new())),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}
