//! Prometheus metrics export.
//!
//! Mirrors router events and telemetry snapshots into a Prometheus registry
//! rendered in the text exposition format.

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

use super::TelemetrySnapshot;
use crate::engine::RouterObserver;
use crate::routing::{Decision, Dispatch, DropReason};
use crate::types::{Packet, SimTime};

/// Prometheus metrics registry and collectors.
pub struct PrometheusMetrics {
    registry: Registry,

    // Traffic metrics
    pub packets_routed_total: IntCounterVec,
    pub bytes_routed_total: IntCounterVec,
    pub packets_dropped_total: IntCounterVec,
    pub packets_trimmed_total: IntCounter,
    pub bytes_trimmed_total: IntCounter,

    // Decision metrics
    pub decisions_total: IntCounterVec,
    pub packet_latency_seconds: Histogram,

    // Path metrics
    pub path_utilization: GaugeVec,
    pub path_latency_seconds: GaugeVec,
    pub path_congestion: GaugeVec,
    pub path_failures: IntGaugeVec,
    pub path_weight: IntGaugeVec,
    pub paths_healthy: IntGauge,
}

impl PrometheusMetrics {
    /// Create a new metrics instance with all collectors registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets_routed_total = IntCounterVec::new(
            Opts::new("pathweave_packets_routed_total", "Packets dispatched per path"),
            &["path"],
        )?;
        let bytes_routed_total = IntCounterVec::new(
            Opts::new("pathweave_bytes_routed_total", "Bytes dispatched per path (after trimming)"),
            &["path"],
        )?;
        let packets_dropped_total = IntCounterVec::new(
            Opts::new("pathweave_packets_dropped_total", "Packets dropped"),
            &["reason"],
        )?;
        let packets_trimmed_total = IntCounter::new(
            "pathweave_packets_trimmed_total",
            "Packets trimmed by congestion mitigation",
        )?;
        let bytes_trimmed_total = IntCounter::new(
            "pathweave_bytes_trimmed_total",
            "Bytes removed by trimming",
        )?;

        let decisions_total = IntCounterVec::new(
            Opts::new("pathweave_decisions_total", "Routing decisions by stage"),
            &["decision"],
        )?;
        let packet_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pathweave_packet_latency_seconds",
                "Packet delay observed at routing time",
            )
            .buckets(vec![1e-6, 1e-5, 1e-4, 5e-4, 1e-3, 5e-3, 0.01, 0.05, 0.1]),
        )?;

        let path_utilization = GaugeVec::new(
            Opts::new("pathweave_path_utilization", "Smoothed path utilization (0-1)"),
            &["path"],
        )?;
        let path_latency_seconds = GaugeVec::new(
            Opts::new("pathweave_path_latency_seconds", "Smoothed path latency in seconds"),
            &["path"],
        )?;
        let path_congestion = GaugeVec::new(
            Opts::new("pathweave_path_congestion", "Path congestion level (0-1)"),
            &["path"],
        )?;
        let path_failures = IntGaugeVec::new(
            Opts::new("pathweave_path_failures", "Failure marks per path"),
            &["path"],
        )?;
        let path_weight = IntGaugeVec::new(
            Opts::new("pathweave_path_weight", "Load-balancing weight per path"),
            &["path"],
        )?;
        let paths_healthy = IntGauge::new(
            "pathweave_paths_healthy",
            "Number of paths currently selectable",
        )?;

        registry.register(Box::new(packets_routed_total.clone()))?;
        registry.register(Box::new(bytes_routed_total.clone()))?;
        registry.register(Box::new(packets_dropped_total.clone()))?;
        registry.register(Box::new(packets_trimmed_total.clone()))?;
        registry.register(Box::new(bytes_trimmed_total.clone()))?;
        registry.register(Box::new(decisions_total.clone()))?;
        registry.register(Box::new(packet_latency_seconds.clone()))?;
        registry.register(Box::new(path_utilization.clone()))?;
        registry.register(Box::new(path_latency_seconds.clone()))?;
        registry.register(Box::new(path_congestion.clone()))?;
        registry.register(Box::new(path_failures.clone()))?;
        registry.register(Box::new(path_weight.clone()))?;
        registry.register(Box::new(paths_healthy.clone()))?;

        Ok(Self {
            registry,
            packets_routed_total,
            bytes_routed_total,
            packets_dropped_total,
            packets_trimmed_total,
            bytes_trimmed_total,
            decisions_total,
            packet_latency_seconds,
            path_utilization,
            path_latency_seconds,
            path_congestion,
            path_failures,
            path_weight,
            paths_healthy,
        })
    }

    /// Encode metrics to Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::Adaptive => "adaptive",
        Decision::RoundRobin => "round_robin",
        Decision::LoadBalanced { .. } => "load_balanced",
    }
}

impl RouterObserver for PrometheusMetrics {
    fn on_dispatch(&mut self, dispatch: &Dispatch) {
        let path = dispatch.path.to_string();
        self.packets_routed_total.with_label_values(&[path.as_str()]).inc();
        self.bytes_routed_total
            .with_label_values(&[path.as_str()])
            .inc_by(dispatch.packet.bytes);
        self.decisions_total
            .with_label_values(&[decision_label(dispatch.decision)])
            .inc();

        if let Some(trim) = dispatch.trimmed {
            self.packets_trimmed_total.inc();
            self.bytes_trimmed_total.inc_by(trim.saved());
        }
        if let Some(latency) = dispatch.latency {
            self.packet_latency_seconds.observe(latency);
        }
    }

    fn on_drop(&mut self, _packet: &Packet, reason: DropReason, _at: SimTime) {
        self.packets_dropped_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) {
        for p in &snapshot.paths {
            let path = p.path.to_string();
            self.path_utilization.with_label_values(&[path.as_str()]).set(p.utilization);
            self.path_latency_seconds.with_label_values(&[path.as_str()]).set(p.latency);
            self.path_congestion.with_label_values(&[path.as_str()]).set(p.congestion_level);
            self.path_failures
                .with_label_values(&[path.as_str()])
                .set(i64::from(p.failure_count));
            self.path_weight
                .with_label_values(&[path.as_str()])
                .set(i64::from(p.weight));
        }
        self.paths_healthy.set(snapshot.healthy_paths() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::engine::{Engine, NullTransmitter};

    #[test]
    fn test_metrics_follow_engine() {
        let config = RouterConfig {
            seed: Some(5),
            ..RouterConfig::with_paths(2)
        };
        let metrics = PrometheusMetrics::new().unwrap();
        let mut engine = Engine::with_observer(config, NullTransmitter, metrics).unwrap();
        engine.schedule(SimTime::from_millis(1.0), Packet::new(1, 1000).with_sender(1));
        engine.run_until(SimTime::from_millis(20.0)).unwrap();

        let output = engine.observer().encode().unwrap();
        assert!(output.contains("pathweave_packets_routed_total"));
        assert!(output.contains("pathweave_path_utilization"));
        assert!(output.contains("pathweave_paths_healthy 2"));
    }
}
