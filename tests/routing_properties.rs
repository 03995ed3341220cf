//! Routing properties: health exclusion, score monotonicity, history bound,
//! load-balanced spread, trimming bound, drop correctness and the basic
//! spread-out scenario.

use std::collections::HashMap;

use pathweave::config::RouterConfig;
use pathweave::routing::{
    trimmed_size, Decision, FlowKey, FlowTable, PathSelector, PathTable, RouteOutcome, Router,
    Scorer,
};
use pathweave::types::{Packet, SimTime};

fn router(config: RouterConfig) -> Router {
    Router::new(config).unwrap()
}

fn seeded(paths: usize) -> RouterConfig {
    RouterConfig {
        seed: Some(42),
        ..RouterConfig::with_paths(paths)
    }
}

fn packet(id: u64, sender: u32) -> Packet {
    Packet::new(id, 1000).with_sender(sender).with_tag("F")
}

// ============================================================================
// Health exclusion
// ============================================================================

#[test]
fn test_failed_paths_never_chosen_while_alternatives_exist() {
    let now = SimTime::from_secs(2.0);

    for failed_mask in 1u32..15 {
        let mut r = router(seeded(4));
        let failed: Vec<usize> = (0..4).filter(|p| failed_mask & (1 << p) != 0).collect();
        for &p in &failed {
            r.paths_mut()
                .mark_failure(p, SimTime::from_secs(1.5))
                .unwrap();
        }

        for id in 0..200 {
            let outcome = r.route(packet(id, (id % 7) as u32), now).unwrap();
            let path = outcome.path().expect("a healthy path exists");
            assert!(
                !failed.contains(&path),
                "mask {failed_mask:#06b}: chose failed path {path}"
            );
        }
    }
}

#[test]
fn test_failed_path_recovers_after_window() {
    let mut r = router(RouterConfig {
        load_balancing: false,
        ..seeded(2)
    });
    r.paths_mut().mark_failure(0, SimTime::from_secs(1.0)).unwrap();

    let during = r.route(packet(1, 1), SimTime::from_secs(1.5)).unwrap();
    assert_eq!(during.path(), Some(1));

    // New flow, so no stickiness towards path 1.
    let after = r.route(packet(2, 2), SimTime::from_secs(2.01)).unwrap();
    assert_eq!(after.path(), Some(0));
}

// ============================================================================
// Score monotonicity
// ============================================================================

#[test]
fn test_score_never_increases_with_utilization() {
    let scorer = Scorer::new(1.0);
    let table = PathTable::new(1);
    let base = table.get(0).unwrap().clone();

    for latency in [0.0, 0.0005, 0.002] {
        for congestion in [0.0, 0.2, 0.5, 0.9] {
            for priority in [false, true] {
                let mut last = f64::INFINITY;
                for step in 0..=50 {
                    let mut m = base.clone();
                    m.utilization = f64::from(step) / 50.0;
                    m.latency = latency;
                    m.congestion_level = congestion;
                    let score = scorer.score_metrics(&m, priority, SimTime::ZERO);
                    assert!(score <= last);
                    last = score;
                }
            }
        }
    }
}

// ============================================================================
// History bound
// ============================================================================

#[test]
fn test_history_bounded_after_many_packets() {
    let mut r = router(seeded(4));
    let p = packet(0, 1);
    let key = FlowKey::derive(&p).unwrap();

    for id in 0..100 {
        let at = SimTime::from_millis(id as f64 * 0.01);
        r.route(packet(id, 1), at).unwrap();
    }

    let flow = r.flows().get(&key).unwrap();
    assert_eq!(flow.packet_count, 100);
    assert_eq!(flow.total_bytes, 100_000);
    assert!(flow.path_history().len() <= 10);
}

// ============================================================================
// Load-balanced spread
// ============================================================================

#[test]
fn test_near_equal_paths_both_selected() {
    let config = RouterConfig {
        seed: Some(2024),
        ..RouterConfig::with_paths(2)
    };
    let mut selector = PathSelector::new(&config);
    let paths = PathTable::new(2);
    let mut flows = FlowTable::new();
    let p = packet(0, 1);
    let key = flows.key_for(&p);
    let mut flow = flows.lookup_or_create(key, &p, SimTime::ZERO).clone();

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for _ in 0..2000 {
        let selection = selector.select(&mut flow, &paths, SimTime::ZERO).unwrap();
        assert_eq!(selection.decision, Decision::LoadBalanced { candidates: 2 });
        *counts.entry(selection.path).or_default() += 1;
    }

    let zero = counts.get(&0).copied().unwrap_or(0);
    let one = counts.get(&1).copied().unwrap_or(0);
    assert_eq!(zero + one, 2000);
    // Equal weights: expect roughly even, far from either extreme.
    assert!(zero > 700, "path 0 chosen {zero} times");
    assert!(one > 700, "path 1 chosen {one} times");
}

#[test]
fn test_same_seed_same_choices() {
    let run = || {
        let mut r = router(seeded(4));
        (0..100)
            .map(|id| r.route(packet(id, 1), SimTime::ZERO).unwrap().path())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

// ============================================================================
// Trimming bound
// ============================================================================

#[test]
fn test_trimming_bound() {
    for size in (1501u64..20_000).step_by(37).chain([65_535, 1 << 20]) {
        assert_eq!(trimmed_size(size), (size * 3 / 4).max(64));
    }
    for size in [0u64, 64, 500, 1500] {
        assert_eq!(trimmed_size(size), size);
    }
}

#[test]
fn test_trimming_disabled_keeps_size() {
    let mut r = router(RouterConfig {
        packet_trimming: false,
        load_balancing: false,
        ..seeded(1)
    });
    r.paths_mut().set_congestion_level(0, 1.0).unwrap();
    // Saturated congestion zeroes the score but the path stays selectable.
    match r.route(Packet::new(1, 9000).with_sender(1), SimTime::ZERO).unwrap() {
        RouteOutcome::Dispatched(d) => {
            assert_eq!(d.packet.bytes, 9000);
            assert!(d.trimmed.is_none());
        }
        RouteOutcome::Dropped { reason, .. } => panic!("dropped: {reason}"),
    }
}

// ============================================================================
// Drop correctness
// ============================================================================

#[test]
fn test_all_failed_drops_packet() {
    let mut r = router(seeded(4));
    let now = SimTime::from_secs(3.0);
    for p in 0..4 {
        r.paths_mut()
            .mark_failure(p, SimTime::from_secs(2.2))
            .unwrap();
    }

    let outcome = r.route(packet(1, 1), now).unwrap();
    assert!(outcome.is_dropped());
    assert_eq!(r.counters().dropped(), 1);
    assert_eq!(r.counters().routed, 0);
    // Nothing was accounted to any path.
    assert!(r.paths().iter().all(|(_, m)| m.utilization == 0.0));
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_flow_spreads_once_latency_accrues() {
    let mut r = router(RouterConfig {
        adaptive_routing: true,
        load_balancing: false,
        packet_trimming: false,
        ..seeded(4)
    });

    // Each packet spends 1 ms in flight before reaching the router.
    let mut chosen = Vec::new();
    for id in 0..3u64 {
        let created = SimTime::from_millis(1.0 + id as f64);
        let arrival = SimTime::from_millis(2.0 + id as f64);
        let p = packet(id, 1).created_at(created);
        chosen.push(r.route(p, arrival).unwrap().path().unwrap());
    }

    assert_eq!(chosen[0], 0);
    assert_eq!(chosen[1], 1);

    let key = FlowKey::derive(&packet(0, 1)).unwrap();
    let history = r.flows().get(&key).unwrap().path_history();
    assert_eq!(history.iter().take(2).copied().collect::<Vec<_>>(), vec![0, 1]);
    assert!(r.paths().get(0).unwrap().utilization > 0.0);
}

#[test]
fn test_stickiness_holds_flow_without_latency() {
    let mut r = router(RouterConfig {
        load_balancing: false,
        packet_trimming: false,
        ..seeded(4)
    });

    for id in 0..3 {
        let outcome = r.route(packet(id, 1), SimTime::from_millis(id as f64)).unwrap();
        assert_eq!(outcome.path(), Some(0));
    }
}
