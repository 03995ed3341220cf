//! Router telemetry: periodic snapshots, counters and end-of-run summary.
//!
//! This module provides:
//! - Per-path telemetry snapshots (emitted on the telemetry cadence)
//! - Monotonic router counters
//! - End-of-run summary, serialisable to JSON
//! - Prometheus metrics export (feature `metrics`)

#[cfg(feature = "metrics")]
mod prometheus_export;

#[cfg(feature = "metrics")]
pub use prometheus_export::*;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::routing::{PathMetrics, PathTable};
use crate::types::SimTime;

/// Counters maintained by the router. All are monotonic over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterCounters {
    /// Packets handed to the transmitter.
    pub routed: u64,
    /// Packets dropped because no path was healthy.
    pub dropped_no_healthy_path: u64,
    /// Packets shrunk by congestion mitigation.
    pub trimmed: u64,
    /// Bytes removed by trimming.
    pub trimmed_bytes: u64,
    /// Decisions made by adaptive scoring.
    pub adaptive_decisions: u64,
    /// Decisions made by plain round-robin.
    pub round_robin_decisions: u64,
    /// Decisions settled by the load-balanced tie-break.
    pub load_balanced_decisions: u64,
    /// Packets of priority flows past the large-flow threshold.
    pub large_flow_events: u64,
    /// Packets matching a collective-communication pattern.
    pub collective_events: u64,
    /// Packets that could not be keyed and got an anonymous flow.
    pub anonymous_flows: u64,
    /// Failure marks set by the failure detector.
    pub failure_marks: u64,
    /// Flows evicted by idle expiry.
    pub flows_evicted: u64,
}

impl RouterCounters {
    /// Total dropped packets across all reasons.
    pub fn dropped(&self) -> u64 {
        self.dropped_no_healthy_path
    }
}

/// Telemetry of one path at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTelemetry {
    pub path: usize,
    pub utilization: f64,
    /// Smoothed latency in seconds.
    pub latency: f64,
    pub congestion_level: f64,
    pub failure_count: u32,
    pub queue_depth: u32,
    pub weight: u32,
    pub healthy: bool,
}

impl PathTelemetry {
    fn capture(path: usize, metrics: &PathMetrics, healthy: bool) -> Self {
        Self {
            path,
            utilization: metrics.utilization,
            latency: metrics.latency,
            congestion_level: metrics.congestion_level,
            failure_count: metrics.failure_count,
            queue_depth: metrics.queue_depth,
            weight: metrics.weight,
            healthy,
        }
    }
}

/// Snapshot of all paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub at: SimTime,
    pub paths: Vec<PathTelemetry>,
}

impl TelemetrySnapshot {
    /// Capture the state of `table` at `now`.
    pub fn capture(table: &PathTable, now: SimTime) -> Self {
        let paths = table
            .iter()
            .map(|(idx, m)| PathTelemetry::capture(idx, m, table.is_healthy(idx, now)))
            .collect();
        Self { at: now, paths }
    }

    /// Number of paths selectable at snapshot time.
    pub fn healthy_paths(&self) -> usize {
        self.paths.iter().filter(|p| p.healthy).count()
    }

    /// Mean utilization across paths.
    pub fn mean_utilization(&self) -> f64 {
        if self.paths.is_empty() {
            return 0.0;
        }
        self.paths.iter().map(|p| p.utilization).sum::<f64>() / self.paths.len() as f64
    }
}

/// Final state of one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub path: usize,
    pub final_utilization: f64,
    pub failure_count: u32,
}

/// End-of-run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Simulated time at which the run stopped.
    pub ended_at: SimTime,
    pub paths: Vec<PathSummary>,
    /// Distinct flows seen during the run, including evicted ones.
    pub flows_observed: u64,
    /// Flows still tracked at the end of the run.
    pub active_flows: usize,
    pub counters: RouterCounters,
}

impl RunSummary {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run ended at {}", self.ended_at)?;
        writeln!(
            f,
            "Flows: {} observed, {} active",
            self.flows_observed, self.active_flows
        )?;
        writeln!(
            f,
            "Packets: {} routed, {} dropped, {} trimmed ({} bytes)",
            self.counters.routed,
            self.counters.dropped(),
            self.counters.trimmed,
            self.counters.trimmed_bytes
        )?;
        for p in &self.paths {
            writeln!(
                f,
                "  path {:>3}: utilization {:.4}, failures {}",
                p.path, p.final_utilization, p.failure_count
            )?;
        }
        Ok(())
    }
}
