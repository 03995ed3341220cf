//! Per-path telemetry store.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EMA_ALPHA, MAX_PATH_WEIGHT, QUEUE_DEPTH_WEIGHT};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::types::SimTime;

/// Failure state of a path.
///
/// Recovery is implicit: a `Failed` path becomes healthy again once the
/// recovery window has elapsed since the last failure mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PathHealth {
    /// Never failed.
    #[default]
    Healthy,
    /// Marked failed at `since`.
    Failed { since: SimTime },
}

impl PathHealth {
    /// Whether the path may be selected at `now`.
    pub fn is_healthy(self, now: SimTime, recovery: f64) -> bool {
        match self {
            Self::Healthy => true,
            Self::Failed { since } => now.since(since) > recovery,
        }
    }

    /// Whether a failure mark is younger than `window` at `now`.
    pub fn failed_within(self, now: SimTime, window: f64) -> bool {
        match self {
            Self::Healthy => false,
            Self::Failed { since } => now.since(since) < window,
        }
    }

    pub fn last_failure(self) -> Option<SimTime> {
        match self {
            Self::Healthy => None,
            Self::Failed { since } => Some(since),
        }
    }
}

/// Rolling telemetry for a single path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMetrics {
    /// Smoothed load (0.0 - 1.0).
    pub utilization: f64,
    /// Smoothed packet delay in seconds.
    pub latency: f64,
    /// Composite of utilization and queue backlog (0.0 - 1.0).
    pub congestion_level: f64,
    /// Number of failure marks.
    pub failure_count: u32,
    /// Failure state.
    pub health: PathHealth,
    /// Last time a packet was routed onto this path.
    pub last_activity: SimTime,
    /// Queue depth reported by the buffering stage.
    pub queue_depth: u32,
    /// Load-balancing weight (1 - 10).
    pub weight: u32,
}

impl PathMetrics {
    fn new(start: SimTime) -> Self {
        Self {
            utilization: 0.0,
            latency: 0.0,
            congestion_level: 0.0,
            failure_count: 0,
            health: PathHealth::Healthy,
            last_activity: start,
            queue_depth: 0,
            weight: 1,
        }
    }

    /// Latency in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.latency * 1000.0
    }
}

/// Telemetry for all egress paths, indexed `0..len`.
#[derive(Debug, Clone)]
pub struct PathTable {
    paths: Vec<PathMetrics>,
    link_capacity_bps: f64,
    window_secs: f64,
    recovery_secs: f64,
}

impl PathTable {
    /// Create `count` paths with default link model parameters.
    pub fn new(count: usize) -> Self {
        Self::from_config(&RouterConfig::with_paths(count), SimTime::ZERO)
    }

    /// Create the paths described by `config`, all idle since `start`.
    pub fn from_config(config: &RouterConfig, start: SimTime) -> Self {
        Self {
            paths: (0..config.paths).map(|_| PathMetrics::new(start)).collect(),
            link_capacity_bps: config.link_capacity_bps,
            window_secs: config.utilization_window.as_secs_f64(),
            recovery_secs: config.failure_recovery.as_secs_f64(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Recovery window in seconds.
    pub fn recovery_window(&self) -> f64 {
        self.recovery_secs
    }

    pub fn get(&self, path: usize) -> Option<&PathMetrics> {
        self.paths.get(path)
    }

    /// Metrics for `path`, or `PathOutOfRange`.
    pub fn metrics(&self, path: usize) -> Result<&PathMetrics> {
        self.paths.get(path).ok_or(Error::PathOutOfRange {
            path,
            count: self.paths.len(),
        })
    }

    fn metrics_mut(&mut self, path: usize) -> Result<&mut PathMetrics> {
        let count = self.paths.len();
        self.paths
            .get_mut(path)
            .ok_or(Error::PathOutOfRange { path, count })
    }

    /// Iterate `(index, metrics)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PathMetrics)> {
        self.paths.iter().enumerate()
    }

    /// Fold a routed packet into the path's moving averages.
    ///
    /// `latency` is the observed packet delay in seconds, when known.
    pub fn update_on_route(&mut self, path: usize, bits: u64, latency: Option<f64>) -> Result<()> {
        let instant = bits as f64 / (self.link_capacity_bps * self.window_secs);
        let metrics = self.metrics_mut(path)?;

        metrics.utilization =
            (EMA_ALPHA * instant + (1.0 - EMA_ALPHA) * metrics.utilization).clamp(0.0, 1.0);

        if let Some(sample) = latency {
            metrics.latency = EMA_ALPHA * sample.max(0.0) + (1.0 - EMA_ALPHA) * metrics.latency;
        }

        metrics.congestion_level = (metrics.utilization
            + f64::from(metrics.queue_depth) * QUEUE_DEPTH_WEIGHT)
            .clamp(0.0, 1.0);

        Ok(())
    }

    /// Record a failure on `path` at `now`. Returns the new failure count.
    pub fn mark_failure(&mut self, path: usize, now: SimTime) -> Result<u32> {
        let metrics = self.metrics_mut(path)?;
        metrics.failure_count = metrics.failure_count.saturating_add(1);
        metrics.health = PathHealth::Failed { since: now };

        // First mark is worth surfacing, repeats come every detector sweep.
        if metrics.failure_count == 1 {
            warn!(path, at = %now, "Path marked failed");
        } else {
            debug!(path, at = %now, failures = metrics.failure_count, "Path failure mark");
        }

        Ok(metrics.failure_count)
    }

    /// Whether `path` may be selected at `now`. Unknown paths are unhealthy.
    pub fn is_healthy(&self, path: usize, now: SimTime) -> bool {
        self.paths
            .get(path)
            .is_some_and(|m| m.failure_count == 0 || m.health.is_healthy(now, self.recovery_secs))
    }

    /// Whether `path` failed within the recovery window before `now`.
    pub fn recently_failed(&self, path: usize, now: SimTime) -> bool {
        self.paths.get(path).is_some_and(|m| {
            m.failure_count > 0 && m.health.failed_within(now, self.recovery_secs)
        })
    }

    /// Indices of paths selectable at `now`.
    pub fn healthy_paths(&self, now: SimTime) -> impl Iterator<Item = usize> + '_ {
        (0..self.paths.len()).filter(move |&p| self.is_healthy(p, now))
    }

    /// Note that a packet was routed onto `path` at `now`.
    pub fn touch(&mut self, path: usize, now: SimTime) -> Result<()> {
        self.metrics_mut(path)?.last_activity = now;
        Ok(())
    }

    /// Update the queue depth reported for `path`.
    pub fn set_queue_depth(&mut self, path: usize, depth: u32) -> Result<()> {
        self.metrics_mut(path)?.queue_depth = depth;
        Ok(())
    }

    /// Overwrite the congestion level of `path` (clamped to 0-1).
    pub fn set_congestion_level(&mut self, path: usize, level: f64) -> Result<()> {
        self.metrics_mut(path)?.congestion_level = level.clamp(0.0, 1.0);
        Ok(())
    }

    /// Recompute load-balancing weights from utilization.
    pub fn recompute_weights(&mut self) {
        for metrics in &mut self.paths {
            let weight = (f64::from(MAX_PATH_WEIGHT) * (1.0 - metrics.utilization)).round();
            metrics.weight = (weight as u32).max(1);
        }
    }

    /// Seconds since the path last carried a packet.
    ///
    /// Kept in `f64`: simulated gaps can exceed what a `Duration` holds.
    pub fn idle_secs(&self, path: usize, now: SimTime) -> Option<f64> {
        self.paths
            .get(path)
            .map(|m| now.since(m.last_activity).max(0.0))
    }
}
