//! StreamWorker behaviour against scripted sources and detectors.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    context, settle, stream, test_config, CollectingSink, CountingDetector, ScriptedSources,
    SourceScript,
};
use sctv_worker::{WorkerHandle, WorkerState};

#[tokio::test(start_paused = true)]
async fn test_detects_every_nth_frame() {
    // 44 frames: detection on frames 15 and 30 only
    let sources = ScriptedSources::new([SourceScript::Frames(44)]);
    let detector = CountingDetector::seeing(0);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector.clone(), sink),
    );
    settle(Duration::from_secs(10)).await;

    assert_eq!(detector.calls(), 2);
    assert!(handle.stop(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_frame_counter_survives_reconnect() {
    // 20 + 10 frames across two connections is still frames 15 and 30
    let sources = ScriptedSources::new([SourceScript::Frames(20), SourceScript::Frames(10)]);
    let detector = CountingDetector::seeing(0);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector.clone(), sink),
    );
    settle(Duration::from_secs(10)).await;

    assert_eq!(detector.calls(), 2);
    assert_eq!(sources.opens(), 3);
    assert_eq!(sources.closes(), 2);
    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_keeps_smoother_history() {
    // Two positive samples, a dropped connection, then the third sample
    let sources = ScriptedSources::new([SourceScript::Frames(30), SourceScript::Frames(15)]);
    let detector = CountingDetector::seeing(1);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector.clone(), sink.clone()),
    );
    settle(Duration::from_secs(10)).await;

    assert_eq!(detector.calls(), 3);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stream_id.as_str(), "cam");
    assert_eq!(events[0].detection_count, 1);
    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_spaces_events() {
    // One sample every 0.75s; first event at ~2.25s, next only after 10s
    let sources = ScriptedSources::new([SourceScript::Endless]);
    let detector = CountingDetector::seeing(2);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources, detector, sink.clone()),
    );

    settle(Duration::from_secs(5)).await;
    assert_eq!(sink.events().len(), 1);

    settle(Duration::from_secs(15)).await;
    assert_eq!(sink.events().len(), 2);

    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_event_carries_annotated_frame() {
    let config = sctv_worker::WorkerConfig {
        send_frame: true,
        ..test_config()
    };
    let sources = ScriptedSources::new([SourceScript::Frames(45)]);
    let detector = CountingDetector::seeing(1);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("gate"),
        context(config, sources, detector, sink.clone()),
    );
    settle(Duration::from_secs(10)).await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stream_name, "Camera gate");
    assert_eq!(events[0].event_type, "person_detection");
    assert!(events[0].frame_jpeg_base64.as_deref().is_some_and(|f| !f.is_empty()));
    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_detector_failure_does_not_stop_pump() {
    let sources = ScriptedSources::new([SourceScript::Endless]);
    let detector = CountingDetector::failing();
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector.clone(), sink.clone()),
    );
    settle(Duration::from_secs(5)).await;

    assert!(detector.calls() >= 5);
    assert_eq!(handle.state(), WorkerState::Running);
    assert_eq!(sources.opens(), 1);
    assert!(sink.events().is_empty());
    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_reconnects() {
    let sources = ScriptedSources::new([
        SourceScript::FailOpen,
        SourceScript::FailOpen,
        SourceScript::Endless,
    ]);
    let detector = CountingDetector::seeing(0);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector, sink),
    );

    settle(Duration::from_millis(150)).await;
    assert_eq!(handle.state(), WorkerState::Reconnecting);

    settle(Duration::from_secs(1)).await;
    assert_eq!(handle.state(), WorkerState::Running);
    assert_eq!(sources.opens(), 3);
    handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_promptly() {
    let sources = ScriptedSources::new([SourceScript::Endless]);
    let detector = CountingDetector::seeing(1);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources.clone(), detector.clone(), sink),
    );
    settle(Duration::from_secs(2)).await;

    let state = handle.subscribe();
    assert!(handle.stop(Duration::from_secs(1)).await);
    assert_eq!(*state.borrow(), WorkerState::Stopped);
    assert_eq!(sources.closes(), 1);

    // No detector calls after the stop was observed
    let calls = detector.calls();
    settle(Duration::from_secs(5)).await;
    assert_eq!(detector.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stalled_read() {
    // The script is empty, so the only source never yields a frame
    let sources = ScriptedSources::new(Vec::new());
    let detector = CountingDetector::seeing(0);
    let sink = Arc::new(CollectingSink::default());

    let handle = WorkerHandle::spawn(
        stream("cam"),
        context(test_config(), sources, detector.clone(), sink),
    );
    settle(Duration::from_secs(1)).await;
    assert_eq!(handle.state(), WorkerState::Running);

    let stopped = tokio_test::assert_ok!(
        tokio::time::timeout(Duration::from_secs(2), handle.stop(Duration::from_secs(1))).await
    );
    assert!(stopped);
    assert_eq!(detector.calls(), 0);
}
