//! Multiplicative path desirability score.

use super::path::{PathMetrics, PathTable};
use crate::types::SimTime;

/// Score multiplier for a path that failed within the recovery window.
const RECENT_FAILURE_PENALTY: f64 = 0.5;

/// Score multiplier for priority traffic on a lightly congested path.
const PRIORITY_BOOST: f64 = 1.3;

/// Congestion level below which priority traffic gets its boost.
const PRIORITY_CONGESTION_CEILING: f64 = 0.3;

/// Path scorer.
///
/// Every factor lies in [0, 1] except the bounded priority boost, so one
/// bad dimension (saturation, latency, congestion, recent failure) is enough
/// to sink a path, and the boost cannot rescue a genuinely bad one.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    recovery_window: f64,
}

impl Scorer {
    /// Create a scorer penalizing failures younger than `recovery_window`
    /// seconds.
    pub fn new(recovery_window: f64) -> Self {
        Self { recovery_window }
    }

    /// Score one path's metrics at `now`.
    pub fn score_metrics(&self, metrics: &PathMetrics, is_priority: bool, now: SimTime) -> f64 {
        let mut score = 1.0 - metrics.utilization;

        score *= 1.0 / (1.0 + metrics.latency_ms());
        score *= 1.0 - metrics.congestion_level;

        if metrics.failure_count > 0 && metrics.health.failed_within(now, self.recovery_window) {
            score *= RECENT_FAILURE_PENALTY;
        }

        if is_priority && metrics.congestion_level < PRIORITY_CONGESTION_CEILING {
            score *= PRIORITY_BOOST;
        }

        score
    }

    /// Score `path` in `table`. Unknown paths score zero.
    pub fn score(&self, table: &PathTable, path: usize, is_priority: bool, now: SimTime) -> f64 {
        table
            .get(path)
            .map_or(0.0, |m| self.score_metrics(m, is_priority, now))
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::PathHealth;

    fn metrics(utilization: f64, latency: f64, congestion: f64) -> PathMetrics {
        let table = PathTable::new(1);
        let mut m = table.metrics(0).unwrap().clone();
        m.utilization = utilization;
        m.latency = latency;
        m.congestion_level = congestion;
        m
    }

    #[test]
    fn test_idle_path_scores_one() {
        let scorer = Scorer::default();
        let m = metrics(0.0, 0.0, 0.0);
        assert!((scorer.score_metrics(&m, false, SimTime::ZERO) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_formula() {
        let scorer = Scorer::default();
        // (1-0.2) * 1/(1+1ms) * (1-0.25)
        let m = metrics(0.2, 0.001, 0.25);
        let expected = 0.8 * 0.5 * 0.75;
        assert!((scorer.score_metrics(&m, false, SimTime::ZERO) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_utilization() {
        let scorer = Scorer::default();
        for priority in [false, true] {
            let mut last = f64::INFINITY;
            for step in 0..=20 {
                let u = f64::from(step) / 20.0;
                let s = scorer.score_metrics(&metrics(u, 0.0005, 0.1), priority, SimTime::ZERO);
                assert!(s >= 0.0);
                assert!(s <= last);
                last = s;
            }
        }
    }

    #[test]
    fn test_recent_failure_halves_score() {
        let scorer = Scorer::default();
        let mut m = metrics(0.0, 0.0, 0.0);
        m.failure_count = 1;
        m.health = PathHealth::Failed { since: SimTime::from_secs(1.0) };

        let during = scorer.score_metrics(&m, false, SimTime::from_secs(1.5));
        let after = scorer.score_metrics(&m, false, SimTime::from_secs(2.5));
        assert!((during - 0.5).abs() < 1e-12);
        assert!((after - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_priority_boost_only_when_lightly_congested() {
        let scorer = Scorer::default();
        let light = metrics(0.1, 0.0, 0.1);
        let heavy = metrics(0.1, 0.0, 0.5);

        let boosted = scorer.score_metrics(&light, true, SimTime::ZERO);
        let plain = scorer.score_metrics(&light, false, SimTime::ZERO);
        assert!((boosted / plain - 1.3).abs() < 1e-9);

        let heavy_priority = scorer.score_metrics(&heavy, true, SimTime::ZERO);
        let heavy_plain = scorer.score_metrics(&heavy, false, SimTime::ZERO);
        assert!((heavy_priority - heavy_plain).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_path_scores_zero() {
        let table = PathTable::new(2);
        assert_eq!(Scorer::default().score(&table, 7, true, SimTime::ZERO), 0.0);
    }
}
