//! Routing Engine Benchmarks — Hot-Path Performance Validation
//!
//! Benchmarks the signal evaluation that runs on every inbound price
//! update. The engine sits between the feeds and every downstream
//! subscriber, so steady-state forwarding must stay well under the
//! push feed's inter-message gap.
//!
//! Run with: cargo bench --bench routing_bench

use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

use feed_router::config::FailoverConfig;
use feed_router::domain::event::{PriceEvent, SourceId};
use feed_router::domain::routing::FailureKind;
use feed_router::ports::feed::Signal;
use feed_router::usecases::RoutingEngine;

fn event(source: SourceId, price: u32) -> Signal {
    Signal::Event(PriceEvent {
        symbol: "AAPL".to_string(),
        price: Decimal::from(price),
        timestamp_ms: 1_700_000_000_000,
        source,
    })
}

/// Engine already in PrimaryActive, with the clock primed.
fn active_engine(now: Instant) -> RoutingEngine {
    let mut engine = RoutingEngine::new(FailoverConfig::default());
    let _ = engine.start();
    let _ = engine.handle(event(SourceId::Primary, 100), now);
    engine
}

/// Benchmark steady-state forwarding: active-source event in, forward
/// action out, silence watchdog re-armed.
fn bench_forward_active_event(c: &mut Criterion) {
    let now = Instant::now();
    let mut engine = active_engine(now);

    c.bench_function("forward_active_event", |b| {
        b.iter(|| {
            let actions = engine.handle(black_box(event(SourceId::Primary, 187)), now);
            black_box(actions);
        });
    });
}

/// Benchmark the drop path: inactive-source event consumed for health
/// bookkeeping only.
fn bench_drop_inactive_event(c: &mut Criterion) {
    let now = Instant::now();
    let mut engine = active_engine(now);

    c.bench_function("drop_inactive_event", |b| {
        b.iter(|| {
            let actions = engine.handle(black_box(event(SourceId::Secondary, 187)), now);
            black_box(actions);
        });
    });
}

/// Benchmark a full transition storm: failures to the threshold, a
/// failover, and a recovery, repeated per iteration.
fn bench_transition_storm(c: &mut Criterion) {
    let now = Instant::now();

    c.bench_function("transition_storm", |b| {
        b.iter(|| {
            let mut engine = active_engine(now);
            // Prove the secondary so the failover has somewhere to go.
            let _ = engine.handle(event(SourceId::Secondary, 99), now);
            for _ in 0..3 {
                let _ = engine.handle(
                    Signal::Failure {
                        source: SourceId::Primary,
                        kind: FailureKind::ConnectionClosed,
                    },
                    now,
                );
            }
            // Primary comes back and the grace window opens.
            let _ = engine.handle(Signal::Healthy(SourceId::Primary), now);
            let actions = engine.handle(event(SourceId::Primary, 101), now);
            black_box(actions);
        });
    });
}

criterion_group!(
    benches,
    bench_forward_active_event,
    bench_drop_inactive_event,
    bench_transition_storm
);
criterion_main!(benches);
