//! Property Tests - Routing Engine Invariants
//!
//! Feeds the pure state machine arbitrary signal sequences through a
//! simulated driver (virtual clock plus faithful epoch-tagged timer
//! delivery) and checks the invariants that must hold for every
//! possible interleaving:
//!
//! - a forwarded event always carries the currently active source
//! - nothing is forwarded in `Startup` or `BothUnavailable`
//! - each evaluation step announces at most one transition, and the
//!   announced target always matches the engine's post-step state

use std::time::{Duration, Instant};

use proptest::prelude::*;
use rust_decimal::Decimal;

use feed_router::config::FailoverConfig;
use feed_router::domain::event::{PriceEvent, SourceId};
use feed_router::domain::routing::FailureKind;
use feed_router::ports::feed::{Signal, TimerKind};
use feed_router::usecases::{Action, RoutingEngine};

/// One step of a generated scenario.
#[derive(Debug, Clone)]
enum Op {
    Event(SourceId, u32),
    Healthy(SourceId),
    Failure(SourceId, FailureKind),
    AdvanceMs(u64),
    HealthTick,
}

fn source_strategy() -> impl Strategy<Value = SourceId> {
    prop_oneof![Just(SourceId::Primary), Just(SourceId::Secondary)]
}

fn failure_strategy() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::AuthRejected),
        Just(FailureKind::ConnectionClosed),
        Just(FailureKind::Timeout),
        Just(FailureKind::HttpStatus(503)),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (source_strategy(), 1u32..100_000).prop_map(|(s, p)| Op::Event(s, p)),
        source_strategy().prop_map(Op::Healthy),
        (source_strategy(), failure_strategy()).prop_map(|(s, k)| Op::Failure(s, k)),
        // Spans both sub-timeout jitter and full watchdog expiries.
        (0u64..45_000).prop_map(Op::AdvanceMs),
        Just(Op::HealthTick),
    ]
}

/// Simulated driver: a virtual clock plus a pending-timer list that
/// delivers `TimerFired` exactly the way the real controller does,
/// including stale epochs for timers the engine has since re-armed.
struct Sim {
    engine: RoutingEngine,
    now: Instant,
    pending: Vec<(TimerKind, u64, Instant)>,
}

impl Sim {
    fn new() -> Self {
        let mut sim = Self {
            engine: RoutingEngine::new(FailoverConfig::default()),
            now: Instant::now(),
            pending: Vec::new(),
        };
        let startup = sim.engine.start();
        sim.absorb(startup);
        sim
    }

    /// Apply one signal and assert the step invariants on its output.
    fn step(&mut self, signal: Signal) {
        let actions = self.engine.handle(signal, self.now);
        self.check(&actions);
        self.absorb(actions);
    }

    fn check(&self, actions: &[Action]) {
        let active = self.engine.state().active_source();
        let mut announces = 0;
        for action in actions {
            match action {
                Action::Forward(event) => {
                    assert_eq!(
                        Some(event.source),
                        active,
                        "forwarded an event for a non-active source in {}",
                        self.engine.state()
                    );
                }
                Action::Announce(change) => {
                    announces += 1;
                    assert_eq!(
                        change.to,
                        self.engine.state(),
                        "announced target differs from post-step state"
                    );
                    assert_ne!(change.from, change.to, "self-transition announced");
                }
                Action::StartTimer { epoch, .. } => {
                    assert_ne!(*epoch, 0, "armed timer with the disarmed epoch");
                }
            }
        }
        assert!(announces <= 1, "more than one transition in a single step");
    }

    fn absorb(&mut self, actions: Vec<Action>) {
        for action in actions {
            if let Action::StartTimer {
                kind,
                duration,
                epoch,
            } = action
            {
                self.pending.push((kind, epoch, self.now + duration));
            }
        }
    }

    /// Move the clock forward, firing due timers in deadline order.
    fn advance(&mut self, delta: Duration) {
        let target = self.now + delta;
        loop {
            let due = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, (_, _, at))| *at <= target)
                .min_by_key(|(_, (_, _, at))| *at)
                .map(|(i, _)| i);
            let Some(i) = due else { break };
            let (kind, epoch, at) = self.pending.remove(i);
            self.now = at;
            self.step(Signal::TimerFired { kind, epoch });
        }
        self.now = target;
    }
}

fn run_ops(ops: Vec<Op>) {
    let mut sim = Sim::new();
    for op in ops {
        match op {
            Op::Event(source, price) => {
                sim.step(Signal::Event(PriceEvent {
                    symbol: "AAPL".to_string(),
                    price: Decimal::from(price),
                    timestamp_ms: 1_700_000_000_000,
                    source,
                }));
            }
            Op::Healthy(source) => sim.step(Signal::Healthy(source)),
            Op::Failure(source, kind) => sim.step(Signal::Failure { source, kind }),
            Op::AdvanceMs(ms) => sim.advance(Duration::from_millis(ms)),
            Op::HealthTick => sim.step(Signal::HealthTick),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// The core safety property: no interleaving of events, health
    /// reports, failures, timer expiries, and clock movement ever makes
    /// the engine forward an event from a source that is not active.
    #[test]
    fn forwards_only_from_the_active_source(
        ops in proptest::collection::vec(op_strategy(), 1..200)
    ) {
        run_ops(ops);
    }

    /// A scenario consisting purely of primary traffic must settle in
    /// PrimaryActive and stay there.
    #[test]
    fn healthy_primary_traffic_is_stable(
        prices in proptest::collection::vec(1u32..100_000, 1..50)
    ) {
        let mut sim = Sim::new();
        for price in prices {
            sim.step(Signal::Event(PriceEvent {
                symbol: "AAPL".to_string(),
                price: Decimal::from(price),
                timestamp_ms: 1_700_000_000_000,
                source: SourceId::Primary,
            }));
            prop_assert_eq!(
                sim.engine.state(),
                feed_router::domain::routing::RoutingState::PrimaryActive
            );
            // Stay well inside the silence watchdog.
            sim.advance(Duration::from_millis(500));
        }
    }
}
