//! End-to-end delivery scenarios
//!
//! These tests drive the public manager API against scripted and in-memory
//! transports, with tokio's paused clock standing in for real backoffs.

use floodgate::observability::QueueMetrics;
use floodgate::{
    BackpressureConfig, BackpressureConfigBuilder, BackpressureManager, BreakerConfig,
    BreakerState, CircuitBreaker, InMemoryPubSub, PublishStatus,
};
use floodgate_testing::MockChannel;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fast_recovery_config() -> BackpressureConfig {
    BackpressureConfigBuilder::new()
        .failure_threshold(2)
        .recovery_timeout(Duration::from_secs(1))
        .build()
        .expect("valid config")
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_and_half_opens_after_recovery() {
    let mut breaker = CircuitBreaker::new(BreakerConfig::new(2, Duration::from_secs(1)));

    breaker.record_failure();
    breaker.record_failure();
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!breaker.is_open());
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn test_publish_goes_through_after_recovery_timeout() {
    let mock = MockChannel::new().with_default_subscribers(1);
    mock.fail_all("connection refused");
    let manager = BackpressureManager::new(Arc::new(mock.clone()), fast_recovery_config());

    for n in 0..3 {
        manager
            .publish_with_backpressure("alerts", json!(n), None)
            .await;
    }
    let status = manager.queue_status(Some("alerts")).await;
    assert_eq!(status.open_channels(), vec!["alerts"]);
    let attempts_while_open = mock.publish_count();

    mock.recover();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let outcome = manager
        .publish_with_backpressure("alerts", json!("after"), None)
        .await;
    assert_eq!(outcome.status, PublishStatus::Published);
    assert_eq!(outcome.subscribers, 1);
    assert!(mock.publish_count() > attempts_while_open);
    assert!(mock.published("alerts").contains(&json!("after")));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_zero_subscribers_never_reach_transport() {
    let mock = MockChannel::new();
    let manager = BackpressureManager::new(Arc::new(mock.clone()), BackpressureConfig::default());

    let outcome = manager
        .publish_with_backpressure("content.guide", json!({"type": "draft"}), None)
        .await;

    assert_eq!(outcome.status, PublishStatus::Queued);
    assert_eq!(mock.publish_count(), 0);
    assert_eq!(mock.subscriber_count_calls(), 1);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_bounded_queue_scenario() {
    let manager = BackpressureManager::new(
        Arc::new(MockChannel::new()),
        BackpressureConfig::default(),
    );

    let mut results = Vec::new();
    for n in 0..3 {
        let outcome = manager
            .publish_with_backpressure("content.guide", json!(n), Some(2))
            .await;
        results.push((outcome.status, outcome.queue_size));
    }

    assert_eq!(
        results,
        vec![
            (PublishStatus::Queued, 1),
            (PublishStatus::Queued, 2),
            (PublishStatus::Rejected, 2),
        ]
    );
    manager.shutdown().await;
}

#[tokio::test]
async fn test_single_subscriber_publish() {
    let mock = MockChannel::new().with_subscribers("content.guide", 1);
    let manager = BackpressureManager::new(Arc::new(mock.clone()), BackpressureConfig::default());

    let outcome = manager
        .publish_with_backpressure("content.guide", json!({"type": "update"}), None)
        .await;

    assert_eq!(outcome.status, PublishStatus::Published);
    assert_eq!(outcome.subscribers, 1);
    let status = manager.queue_status(Some("content.guide")).await;
    assert_eq!(status.get("content.guide").unwrap().failure_count, 0);
    assert_eq!(mock.published("content.guide"), vec![json!({"type": "update"})]);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_outage_then_recovery_delivers_backlog_in_order() {
    let mock = MockChannel::new().with_default_subscribers(1);
    mock.fail_all("connection refused");
    let manager = BackpressureManager::new(Arc::new(mock.clone()), fast_recovery_config());

    let mut statuses = Vec::new();
    for n in 0..5 {
        let outcome = manager
            .publish_with_backpressure("orders", json!({ "seq": n }), None)
            .await;
        statuses.push(outcome.status);
    }
    assert!(statuses.iter().all(|s| *s == PublishStatus::Queued));
    // Two failures open the breaker; later publishes skip the transport
    assert_eq!(mock.publish_count(), 2);
    assert_eq!(mock.subscriber_count_calls(), 2);

    mock.recover();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let delivered: Vec<_> = mock
        .published("orders")
        .iter()
        .map(|v| v["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(delivered, vec![0, 1, 2, 3, 4]);

    let status = manager.queue_status(Some("orders")).await;
    let orders = status.get("orders").unwrap();
    assert_eq!(orders.queue_size, 0);
    assert_eq!(orders.delivered, 5);
    assert_eq!(orders.breaker_state, BreakerState::Closed);
    assert_eq!(orders.failure_count, 0);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_breakers_are_per_channel() {
    let mock = MockChannel::new()
        .with_default_subscribers(1)
        .with_failures(2);
    let manager = BackpressureManager::new(Arc::new(mock.clone()), fast_recovery_config());

    for n in 0..2 {
        manager
            .publish_with_backpressure("flaky", json!(n), None)
            .await;
    }
    let outcome = manager
        .publish_with_backpressure("healthy", json!("ok"), None)
        .await;
    assert_eq!(outcome.status, PublishStatus::Published);

    let status = manager.queue_status(None).await;
    assert_eq!(status.open_channels(), vec!["flaky"]);
    assert_eq!(
        status.get("healthy").unwrap().breaker_state,
        BreakerState::Closed
    );
    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_share_one_channel() {
    let mock = MockChannel::new().with_default_subscribers(1);
    let manager = Arc::new(BackpressureManager::new(
        Arc::new(mock.clone()),
        BackpressureConfig::default(),
    ));

    let publishes = (0..50).map(|n| {
        let manager = Arc::clone(&manager);
        async move {
            manager
                .publish_with_backpressure("fanin", json!({ "n": n }), None)
                .await
        }
    });
    let outcomes = join_all(publishes).await;

    assert!(outcomes.iter().all(|o| o.status == PublishStatus::Published));
    assert_eq!(manager.channel_names(), vec!["fanin"]);
    assert_eq!(mock.published("fanin").len(), 50);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_receives_backlog() {
    let pubsub = Arc::new(InMemoryPubSub::new());
    let manager = BackpressureManager::new(pubsub.clone(), BackpressureConfig::default());

    let outcome = manager
        .publish_with_backpressure("chat", json!({"text": "hello"}), None)
        .await;
    assert_eq!(outcome.status, PublishStatus::Queued);

    let mut rx = pubsub.subscribe("chat");
    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("drain worker delivers within its poll interval")
        .unwrap();
    assert_eq!(received["text"], "hello");
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_backlog_and_refuses_new_work() {
    let mock = MockChannel::new().with_default_subscribers(1);
    mock.fail_all("broker down");
    let manager = BackpressureManager::new(Arc::new(mock.clone()), fast_recovery_config());

    for n in 0..3 {
        manager
            .publish_with_backpressure("orders", json!(n), None)
            .await;
    }
    assert_eq!(manager.queue_status(None).await.total_queued(), 3);

    manager.shutdown().await;
    assert!(manager.is_shut_down());
    assert!(manager.queue_status(None).await.is_empty());

    let outcome = manager
        .publish_with_backpressure("orders", json!(4), None)
        .await;
    assert_eq!(outcome.status, PublishStatus::Error);
    assert!(mock.published("orders").is_empty());
}

#[tokio::test]
async fn test_status_exports_to_prometheus() {
    let mock = MockChannel::new().with_subscribers("live", 2);
    let manager = BackpressureManager::new(Arc::new(mock), BackpressureConfig::default());
    manager
        .publish_with_backpressure("live", json!(1), None)
        .await;
    manager
        .publish_with_backpressure("idle", json!(1), None)
        .await;

    let metrics = QueueMetrics::new("floodgate", 10).unwrap();
    metrics
        .observe(&manager.queue_status(None).await)
        .unwrap();
    let text = metrics.render().unwrap();

    assert!(text.contains("floodgate_queue_depth{channel=\"idle\"} 1"));
    assert!(text.contains("floodgate_queue_depth{channel=\"live\"} 0"));
    manager.shutdown().await;
}
