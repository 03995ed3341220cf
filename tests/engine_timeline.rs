//! Event engine: ordering, periodic timers, cancellation and the
//! interaction of the failure detector with real traffic.

use std::time::Duration;

use pathweave::config::RouterConfig;
use pathweave::engine::{Engine, Event, NullTransmitter, Recorder, Timeline, TimerKind};
use pathweave::routing::DropReason;
use pathweave::types::{Packet, SimTime};

fn ms(v: f64) -> SimTime {
    SimTime::from_millis(v)
}

fn config(paths: usize) -> RouterConfig {
    RouterConfig {
        seed: Some(11),
        ..RouterConfig::with_paths(paths)
    }
}

// ============================================================================
// Timeline
// ============================================================================

#[test]
fn test_timers_interleave_with_arrivals() {
    let mut tl = Timeline::new();
    tl.arm(TimerKind::CongestionRefresh, ms(1.0));
    tl.schedule_arrival(ms(0.5), Packet::new(1, 100));
    tl.schedule_arrival(ms(1.0), Packet::new(2, 100));

    let (t1, e1) = tl.pop().unwrap();
    assert_eq!(t1, ms(0.5));
    assert!(matches!(e1, Event::Arrival(ref p) if p.id == 1));

    // Timer armed first wins the tie at 1 ms.
    let (_, e2) = tl.pop().unwrap();
    assert_eq!(e2, Event::Timer(TimerKind::CongestionRefresh));

    let (_, e3) = tl.pop().unwrap();
    assert!(matches!(e3, Event::Arrival(ref p) if p.id == 2));
    assert!(tl.pop().is_none());
}

#[test]
fn test_shutdown_leaves_no_timer_work() {
    let mut engine = Engine::new(config(4), NullTransmitter).unwrap();
    for kind in [
        TimerKind::FailureDetection,
        TimerKind::CongestionRefresh,
        TimerKind::Telemetry,
    ] {
        assert!(engine.timeline().is_armed(kind));
    }

    engine.shutdown();
    assert!(!engine.step().unwrap());
}

// ============================================================================
// Periodic behaviour
// ============================================================================

#[test]
fn test_congestion_refresh_recomputes_weights() {
    let cfg = RouterConfig {
        rapid_failure_detection: false,
        advanced_telemetry: false,
        ..config(2)
    };
    let mut engine = Engine::new(cfg, NullTransmitter).unwrap();
    for id in 0..50 {
        engine.schedule(ms(0.1), Packet::new(id, 1_000_000).with_sender(1).with_tag("bulk"));
    }
    engine.run_until(ms(2.0)).unwrap();

    let paths = engine.router().paths();
    let total_util: f64 = paths.iter().map(|(_, m)| m.utilization).sum();
    assert!(total_util > 0.0);
    for (_, m) in paths.iter() {
        let expected = ((10.0 * (1.0 - m.utilization)).round() as u32).max(1);
        assert_eq!(m.weight, expected);
        assert!((m.congestion_level - m.utilization).abs() < 1e-12);
    }
}

#[test]
fn test_flow_expiry_timer_evicts_idle_flows() {
    let cfg = RouterConfig {
        rapid_failure_detection: false,
        flow_idle_timeout: Some(Duration::from_millis(20)),
        ..config(2)
    };
    let mut engine = Engine::new(cfg, NullTransmitter).unwrap();
    engine.schedule(ms(1.0), Packet::new(1, 100).with_sender(1));
    engine.schedule(ms(1.0), Packet::new(2, 100).with_sender(2));
    engine.schedule(ms(55.0), Packet::new(3, 100).with_sender(3));

    let summary = engine.run_until(ms(60.0)).unwrap();
    assert_eq!(summary.flows_observed, 3);
    assert_eq!(summary.active_flows, 1);
    assert_eq!(summary.counters.flows_evicted, 2);
}

#[test]
fn test_steady_traffic_keeps_paths_healthy() {
    let cfg = RouterConfig {
        load_balancing: false,
        ..config(2)
    };
    let mut engine = Engine::with_observer(cfg, NullTransmitter, Recorder::new()).unwrap();
    // Round-robin senders keep both paths busy well inside the threshold.
    for i in 0..400u32 {
        let p = Packet::new(u64::from(i), 500).with_sender(i % 2).with_tag("steady");
        engine.schedule(ms(f64::from(i) * 0.5), p);
    }
    let summary = engine.run_until(ms(200.0)).unwrap();

    assert_eq!(summary.counters.dropped(), 0);
    assert_eq!(summary.counters.routed, 400);
    assert!(!engine.observer().snapshots.is_empty());
}

#[test]
fn test_idle_paths_are_marked_and_shunned() {
    let cfg = RouterConfig {
        load_balancing: false,
        ..config(2)
    };
    let mut engine = Engine::with_observer(cfg, NullTransmitter, Recorder::new()).unwrap();
    engine.schedule(ms(1.0), Packet::new(1, 100).with_sender(1));
    // After a long silence every path has been marked idle-failed and the
    // marks keep being renewed, so the next packet has nowhere to go.
    engine.schedule(ms(300.0), Packet::new(2, 100).with_sender(1));

    let summary = engine.run_until(ms(300.0)).unwrap();
    assert_eq!(summary.counters.routed, 1);
    assert_eq!(summary.counters.dropped(), 1);
    assert!(summary.counters.failure_marks > 0);

    let recorder = engine.observer();
    assert_eq!(recorder.drops[0].1, DropReason::NoHealthyPath);
    assert_eq!(recorder.drops[0].2, ms(300.0));
}

#[test]
fn test_round_robin_ignores_failure_marks() {
    let cfg = RouterConfig {
        adaptive_routing: false,
        load_balancing: false,
        ..config(3)
    };
    let mut engine = Engine::with_observer(cfg, NullTransmitter, Recorder::new()).unwrap();
    for id in 0..6 {
        engine.schedule(ms(200.0), Packet::new(id, 100).with_sender(1));
    }
    engine.run_until(ms(200.0)).unwrap();

    assert_eq!(engine.observer().paths(), vec![0, 1, 2, 0, 1, 2]);
}
