//! Publish Path Benchmarks
//!
//! Cost of a single `publish_with_backpressure` call on the direct publish
//! route and on the routes that skip the transport.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use floodgate::{
    BackpressureConfig, BackpressureConfigBuilder, BackpressureManager, BreakerConfig,
    CircuitBreaker, InMemoryPubSub,
};
use floodgate_testing::MockChannel;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Benchmark the route taken when the channel is healthy and has subscribers
fn bench_direct_publish(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("direct_publish");
    group.throughput(Throughput::Elements(1));

    let pubsub = Arc::new(InMemoryPubSub::new());
    let _rx = pubsub.subscribe("bench");
    let manager = BackpressureManager::new(pubsub.clone(), BackpressureConfig::default());

    for size in [16usize, 256, 4096] {
        let payload = json!({ "body": "x".repeat(size) });
        group.bench_with_input(BenchmarkId::new("in_memory", size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    manager
                        .publish_with_backpressure("bench", payload.clone(), None)
                        .await,
                )
            })
        });
    }

    group.finish();
    rt.block_on(manager.shutdown());
}

/// Benchmark routes that never reach the transport's publish
fn bench_fallback_routes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("fallback_routes");
    group.throughput(Throughput::Elements(1));

    // Full queue: every call is rejected without mutating the queue
    let mock = MockChannel::new();
    mock.fail_all("bench");
    let manager = BackpressureManager::new(Arc::new(mock), BackpressureConfig::default());
    rt.block_on(async {
        manager
            .publish_with_backpressure("full", json!(0), Some(1))
            .await
    });
    group.bench_function("rejected", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                manager
                    .publish_with_backpressure("full", json!(1), Some(1))
                    .await,
            )
        })
    });
    rt.block_on(manager.shutdown());

    // Open breaker: no transport calls, the queue fills up and then rejects
    let mock = MockChannel::new().with_default_subscribers(1);
    mock.fail_all("bench");
    let config = BackpressureConfigBuilder::new()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(3600))
        .build()
        .unwrap();
    let manager = BackpressureManager::new(Arc::new(mock), config);
    rt.block_on(async {
        manager
            .publish_with_backpressure("open", json!(0), None)
            .await
    });
    group.bench_function("breaker_open", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                manager
                    .publish_with_backpressure("open", json!(1), None)
                    .await,
            )
        })
    });
    rt.block_on(manager.shutdown());

    group.finish();
}

/// Benchmark the breaker state machine on its own
fn bench_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker");

    group.bench_function("closed_is_open", |b| {
        let mut breaker = CircuitBreaker::default();
        b.iter(|| black_box(breaker.is_open()))
    });

    group.bench_function("failure_success_cycle", |b| {
        let mut breaker =
            CircuitBreaker::new(BreakerConfig::new(u32::MAX, Duration::from_secs(30)));
        b.iter(|| {
            breaker.record_failure();
            breaker.record_success();
            black_box(breaker.failure_count())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_direct_publish,
    bench_fallback_routes,
    bench_breaker
);
criterion_main!(benches);
