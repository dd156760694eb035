//! Integration tests for the ingestion pipeline and capture reader
//!
//! Run with: cargo test -p depth-feed --test pipeline

use depth_book::MatchOutcome;
use depth_feed::{
    trade_file, CaptureFolder, OverflowPolicy, Pipeline, PipelineConfig, Termination, DEPTH_FILE,
    SNAPSHOT_FILE,
};
use depth_types::{Decimal, DepthError, DiffMessage, Level, Side, Snapshot, TradeEvent};
use rust_decimal_macros::dec;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn snapshot() -> Snapshot {
    Snapshot {
        last_update_id: 100,
        bids: vec![Level::new(dec!(100), dec!(1)), Level::new(dec!(99), dec!(2))],
        asks: vec![Level::new(dec!(101), dec!(1)), Level::new(dec!(102), dec!(3))],
    }
}

fn diff(first: u64, last: u64, time: u64, bids: Vec<Level>, asks: Vec<Level>) -> DiffMessage {
    DiffMessage::new(first, last, time, bids, asks)
}

fn write_capture(dir: &Path, depth_lines: &[String], bid_trades: &[String]) {
    fs::write(dir.join(SNAPSHOT_FILE), snapshot().to_json().unwrap()).unwrap();
    fs::write(dir.join(DEPTH_FILE), depth_lines.join("\n")).unwrap();
    if !bid_trades.is_empty() {
        fs::write(dir.join(trade_file(Side::Bid)), bid_trades.join("\n")).unwrap();
    }
}

#[tokio::test]
async fn test_pipeline_reconstructs_until_closed() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let sender = pipeline.sender();
    let handle = pipeline.spawn(snapshot());

    sender
        .send_diff(diff(90, 95, 900, vec![Level::new(dec!(98), dec!(1))], Vec::new()))
        .await
        .unwrap();
    sender
        .send_diff(diff(99, 101, 1000, vec![Level::new(dec!(100), dec!(0))], Vec::new()))
        .await
        .unwrap();
    sender
        .send_diff(diff(102, 103, 1100, Vec::new(), vec![Level::new(dec!(101), dec!(4))]))
        .await
        .unwrap();
    sender.close();

    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.termination, Termination::Closed);
    assert_eq!(output.dropped, 0);

    let stats = output.report.stats.book;
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.applied, 2);

    let timeline = &output.report.timeline;
    assert_eq!(timeline.len(), 2);
    let first = timeline.nearest_at_or_after(1000).unwrap();
    assert_eq!(first.best_bid_price(), Some(dec!(99)));
    let last = timeline.last().unwrap();
    assert_eq!(last.book().quantity(Side::Ask, dec!(101)), Some(dec!(4)));
}

#[tokio::test]
async fn test_pipeline_gap_is_fatal() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let sender = pipeline.sender();
    let handle = pipeline.spawn(snapshot());

    sender.send_diff(diff(99, 101, 1000, Vec::new(), Vec::new())).await.unwrap();
    sender.send_diff(diff(105, 106, 1100, Vec::new(), Vec::new())).await.unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        DepthError::Desynchronization { expected: 102, actual: 105 }
    ));
    assert!(err.requires_snapshot());

    // the consumer is gone, producers are released
    assert!(sender.is_closed());
    let late = sender.send_diff(diff(107, 108, 1200, Vec::new(), Vec::new())).await;
    assert!(matches!(late, Err(DepthError::ChannelClosed)));
}

#[tokio::test]
async fn test_stop_signal_ends_run() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let sender = pipeline.sender();
    let stop = pipeline.stop_signal();
    let handle = pipeline.spawn(snapshot());

    sender.send_diff(diff(99, 101, 1000, Vec::new(), Vec::new())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop.stop();

    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.termination, Termination::Stopped);
    assert_eq!(output.report.timeline.len(), 1);
}

#[tokio::test]
async fn test_stop_before_alignment_reports_missing_alignment() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let stop = pipeline.stop_signal();
    stop.stop();

    let err = pipeline.run(snapshot()).await.unwrap_err();
    assert!(matches!(
        err,
        DepthError::AlignmentNotFound { last_update_id: 100, .. }
    ));
}

#[tokio::test]
async fn test_transport_failure_keeps_queued_records() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let sender = pipeline.sender();

    sender.send_diff(diff(99, 101, 1000, Vec::new(), Vec::new())).await.unwrap();
    sender.send_diff(diff(102, 102, 1001, Vec::new(), Vec::new())).await.unwrap();
    sender.fail("connection reset");

    let output = pipeline.run(snapshot()).await.unwrap();
    assert_eq!(
        output.termination,
        Termination::Transport("connection reset".to_string())
    );
    assert_eq!(output.report.timeline.len(), 2);
}

#[tokio::test]
async fn test_raw_records_skip_malformed() {
    let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
    let sender = pipeline.sender();

    sender
        .send_raw(r#"{"e":"depthUpdate","E":1000,"s":"BTCUSDT","U":99,"u":101,"b":[],"a":[["101","0.5"]]}"#)
        .await
        .unwrap();
    sender.send_raw("{not json").await.unwrap();
    sender
        .send_raw(r#"{"e":"depthUpdate","E":1100,"s":"BTCUSDT","U":102,"u":104,"b":[],"a":[["101",0.25]]}"#)
        .await
        .unwrap();
    sender.close();

    let output = pipeline.run(snapshot()).await.unwrap();
    assert_eq!(output.report.stats.malformed, 2);
    assert_eq!(output.report.timeline.len(), 1);
    let state = output.report.timeline.last().unwrap();
    assert_eq!(state.best_ask_price(), Some(dec!(101)));
    assert_eq!(state.book().quantity(Side::Ask, dec!(101)), Some(dec!(0.5)));
}

#[tokio::test]
async fn test_drop_newest_counts_losses() {
    let config = PipelineConfig::new()
        .with_queue_capacity(2)
        .with_overflow_policy(OverflowPolicy::DropNewest);
    let pipeline = Pipeline::new(config).unwrap();
    let sender = pipeline.sender();

    // nothing consumes yet, so the third push overflows
    sender.send_diff(diff(99, 101, 1000, Vec::new(), Vec::new())).await.unwrap();
    sender.send_diff(diff(102, 103, 1100, Vec::new(), Vec::new())).await.unwrap();
    let pushed = sender
        .send_diff(diff(104, 105, 1200, Vec::new(), Vec::new()))
        .await
        .unwrap();
    assert!(pushed.lost_record());
    sender.close();

    let output = pipeline.run(snapshot()).await.unwrap();
    assert_eq!(output.dropped, 1);
    assert_eq!(output.report.timeline.len(), 2);
}

#[tokio::test]
async fn test_blocking_policy_applies_backpressure() {
    let config = PipelineConfig::new().with_queue_capacity(1);
    let pipeline = Pipeline::new(config).unwrap();
    let sender = pipeline.sender();
    let handle = pipeline.spawn(snapshot());

    for id in 101..=150u64 {
        let first = if id == 101 { 99 } else { id };
        sender
            .send_diff(diff(first, id, id * 10, vec![Level::new(dec!(100), dec!(1))], Vec::new()))
            .await
            .unwrap();
    }
    sender.close();

    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.dropped, 0);
    assert_eq!(output.report.stats.book.applied, 50);
}

#[test]
fn test_capture_replay() {
    let tmp = TempDir::new().unwrap();
    let depth = vec![
        diff(99, 101, 1000, Vec::new(), Vec::new()).to_json().unwrap(),
        "garbage".to_string(),
        String::new(),
        diff(102, 104, 1050, vec![Level::new(dec!(100), dec!(0.5))], Vec::new())
            .to_json()
            .unwrap(),
    ];
    let trades = vec![
        TradeEvent::new(1020, dec!(100), dec!(0.5), true)
            .with_trade_id("7")
            .to_json()
            .unwrap(),
    ];
    write_capture(tmp.path(), &depth, &trades);

    let folder = CaptureFolder::new(tmp.path());
    let capture = folder.load().unwrap();
    assert_eq!(capture.diffs.len(), 2);
    assert_eq!(capture.bid_trades.len(), 1);
    assert!(capture.ask_trades.is_empty());
    assert_eq!(capture.malformed, 1);

    let report = capture.replay(&PipelineConfig::new()).unwrap();
    assert_eq!(report.timeline.len(), 2);
    assert_eq!(report.stats.malformed, 1);
    assert_eq!(report.trades.trade_count(Side::Bid), 1);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(
        report.matches[0].outcome,
        MatchOutcome::Matched { event_time: 1050 }
    );
}

#[tokio::test]
async fn test_capture_feed_matches_replay() {
    let tmp = TempDir::new().unwrap();
    let depth: Vec<String> = (0..20u64)
        .map(|i| {
            let first = if i == 0 { 99 } else { 101 + i };
            let ask = Level::new(dec!(101), dec!(1) + Decimal::from(i));
            diff(first, 101 + i, 1000 + i, Vec::new(), vec![ask])
                .to_json()
                .unwrap()
        })
        .collect();
    write_capture(tmp.path(), &depth, &[]);

    let capture = CaptureFolder::new(tmp.path()).load().unwrap();
    let replayed = capture.replay(&PipelineConfig::new()).unwrap();

    let pipeline = Pipeline::new(PipelineConfig::new().with_queue_capacity(4)).unwrap();
    let sender = pipeline.sender();
    let handle = pipeline.spawn(capture.snapshot.clone());
    let queued = capture.feed(&sender).await.unwrap();
    let output = handle.await.unwrap().unwrap();

    assert_eq!(queued, 20);
    assert_eq!(output.termination, Termination::Closed);
    assert_eq!(output.report.timeline, replayed.timeline);
}

#[test]
fn test_capture_missing_depth_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(SNAPSHOT_FILE), snapshot().to_json().unwrap()).unwrap();

    let err = CaptureFolder::new(tmp.path()).load().unwrap_err();
    match err {
        DepthError::Io { path, .. } => assert!(path.ends_with(DEPTH_FILE)),
        other => panic!("unexpected error: {other}"),
    }
}
