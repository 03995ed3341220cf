//! Per-packet routing and periodic maintenance.
//!
//! The router owns every piece of routing state (flow table, path metrics,
//! selector RNG and counters). It is driven from a single event loop, so a
//! packet's full decision completes before anything else touches the state.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::congestion::{CongestionController, Trim};
use super::failure::FailureDetector;
use super::flow::{FlowKey, FlowTable};
use super::path::PathTable;
use super::selector::{observe_workload, Decision, PathSelector};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::metrics::{PathSummary, RouterCounters, RunSummary, TelemetrySnapshot};
use crate::types::{Packet, SimTime};

/// Why a packet was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Every path was inside its failure recovery window.
    NoHealthyPath,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoHealthyPath => "no_healthy_path",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routed packet ready for the transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// The packet, possibly trimmed.
    pub packet: Packet,
    /// Chosen egress path.
    pub path: usize,
    pub decision: Decision,
    /// Time at which the packet leaves the router (arrival + routing latency).
    pub depart_at: SimTime,
    /// Size reduction applied by congestion mitigation.
    pub trimmed: Option<Trim>,
    /// Latency sample folded into the path metrics, in seconds.
    pub latency: Option<f64>,
}

/// Result of routing one packet.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Dispatched(Dispatch),
    Dropped { packet: Packet, reason: DropReason },
}

impl RouteOutcome {
    pub fn path(&self) -> Option<usize> {
        match self {
            Self::Dispatched(d) => Some(d.path),
            Self::Dropped { .. } => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

/// Adaptive multi-path router.
pub struct Router {
    config: RouterConfig,
    paths: PathTable,
    flows: FlowTable,
    selector: PathSelector,
    congestion: CongestionController,
    detector: FailureDetector,
    counters: RouterCounters,
}

impl Router {
    /// Create a router with all paths idle since time zero.
    ///
    /// Fails with `InvalidConfig` before any packet can be processed.
    pub fn new(config: RouterConfig) -> Result<Self> {
        Self::starting_at(config, SimTime::ZERO)
    }

    /// Create a router whose paths count as last active at `start`.
    pub fn starting_at(config: RouterConfig, start: SimTime) -> Result<Self> {
        config.validate()?;

        info!(
            paths = config.paths,
            adaptive = config.adaptive_routing,
            congestion_control = config.congestion_control,
            load_balancing = config.load_balancing,
            "Router initialized"
        );

        Ok(Self {
            paths: PathTable::from_config(&config, start),
            flows: FlowTable::new(),
            selector: PathSelector::new(&config),
            congestion: CongestionController::new(&config),
            detector: FailureDetector::new(config.inactivity_threshold),
            counters: RouterCounters::default(),
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Mutable path metrics, for collaborators that inject telemetry.
    pub fn paths_mut(&mut self) -> &mut PathTable {
        &mut self.paths
    }

    pub fn flows(&self) -> &FlowTable {
        &self.flows
    }

    pub fn counters(&self) -> &RouterCounters {
        &self.counters
    }

    /// Fixed delay added to every dispatched packet.
    pub fn routing_latency(&self) -> Duration {
        self.config.routing_latency
    }

    /// Route one packet arriving at `now`.
    ///
    /// Finding no healthy path is reported as a drop, not an error; any other
    /// selection failure is propagated.
    pub fn route(&mut self, mut packet: Packet, now: SimTime) -> Result<RouteOutcome> {
        let key = self.flows.key_for(&packet);
        if key.is_anonymous() {
            self.counters.anonymous_flows += 1;
            debug!(packet = packet.id, flow = %key, "Packet without flow identity");
        }

        let flow = self.flows.lookup_or_create(key.clone(), &packet, now);

        let selection = match self.selector.select(flow, &self.paths, now) {
            Ok(selection) => selection,
            Err(Error::NoHealthyPath) => {
                return Ok(self.drop_packet(packet, &key, DropReason::NoHealthyPath, now))
            }
            Err(e) => return Err(e),
        };

        let observation = observe_workload(flow, &packet);
        if observation.large_flow {
            self.counters.large_flow_events += 1;
            debug!(flow = %key, bytes = flow.total_bytes, "Large priority flow");
        }
        if observation.collective_pattern {
            self.counters.collective_events += 1;
        }

        match selection.decision {
            Decision::Adaptive => self.counters.adaptive_decisions += 1,
            Decision::RoundRobin => self.counters.round_robin_decisions += 1,
            Decision::LoadBalanced { .. } => {
                self.counters.load_balanced_decisions += 1;
                if self.config.adaptive_routing {
                    self.counters.adaptive_decisions += 1;
                } else {
                    self.counters.round_robin_decisions += 1;
                }
            }
        }

        let path = selection.path;
        let trimmed = self.congestion.mitigate(&self.paths, path, &mut packet);
        if let Some(trim) = trimmed {
            self.counters.trimmed += 1;
            self.counters.trimmed_bytes += trim.saved();
        }

        let latency = packet
            .created_at
            .filter(|&created| created > SimTime::ZERO)
            .map(|created| now.since(created).max(0.0));

        self.paths.update_on_route(path, packet.bits(), latency)?;
        self.paths.touch(path, now)?;
        self.counters.routed += 1;

        debug!(
            packet = packet.id,
            flow = %key,
            path,
            decision = ?selection.decision,
            bytes = packet.bytes,
            "Packet routed"
        );

        Ok(RouteOutcome::Dispatched(Dispatch {
            depart_at: now + self.config.routing_latency,
            packet,
            path,
            decision: selection.decision,
            trimmed,
            latency,
        }))
    }

    fn drop_packet(
        &mut self,
        packet: Packet,
        key: &FlowKey,
        reason: DropReason,
        now: SimTime,
    ) -> RouteOutcome {
        match reason {
            DropReason::NoHealthyPath => self.counters.dropped_no_healthy_path += 1,
        }
        warn!(packet = packet.id, flow = %key, at = %now, %reason, "Packet dropped");
        RouteOutcome::Dropped { packet, reason }
    }

    /// Report the queue depth of `path` from the buffering stage.
    pub fn set_queue_depth(&mut self, path: usize, depth: u32) -> Result<()> {
        self.paths.set_queue_depth(path, depth)
    }

    /// Mark every path idle past the inactivity threshold.
    pub fn failure_sweep(&mut self, now: SimTime) -> Vec<usize> {
        let marked = self.detector.sweep(&mut self.paths, now);
        self.counters.failure_marks += marked.len() as u64;
        marked
    }

    /// Recompute congestion levels (and weights when load balancing).
    pub fn congestion_refresh(&mut self) {
        self.congestion
            .periodic_refresh(&mut self.paths, self.config.load_balancing);
    }

    /// Evict idle flows when a flow idle timeout is configured.
    pub fn expire_flows(&mut self, now: SimTime) -> usize {
        let Some(timeout) = self.config.flow_idle_timeout else {
            return 0;
        };
        let removed = self.flows.evict_idle(now, timeout);
        if removed > 0 {
            self.counters.flows_evicted += removed as u64;
            debug!(removed, remaining = self.flows.len(), "Idle flows evicted");
        }
        removed
    }

    /// Capture per-path telemetry at `now`.
    pub fn telemetry(&self, now: SimTime) -> TelemetrySnapshot {
        TelemetrySnapshot::capture(&self.paths, now)
    }

    /// Summarize the run so far.
    pub fn summary(&self, now: SimTime) -> RunSummary {
        RunSummary {
            ended_at: now,
            paths: self
                .paths
                .iter()
                .map(|(path, m)| PathSummary {
                    path,
                    final_utilization: m.utilization,
                    failure_count: m.failure_count,
                })
                .collect(),
            flows_observed: self.flows.total_created(),
            active_flows: self.flows.len(),
            counters: self.counters,
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("paths", &self.paths.len())
            .field("flows", &self.flows.len())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
