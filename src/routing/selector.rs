//! Path selection: adaptive scoring, round-robin fallback and weighted
//! load-balanced tie-break.
//!
//! A decision runs through these stages:
//! 1. Base candidate: highest-scoring healthy path (with a stickiness bonus
//!    for paths in the flow's history), or plain round-robin when adaptive
//!    routing is off.
//! 2. Tie-break: healthy paths scoring within [`LOAD_BALANCE_TOLERANCE`] of
//!    the base candidate share the traffic by weighted random choice.
//! 3. Workload observation: large priority flows and collective patterns are
//!    reported for telemetry only.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::flow::Flow;
use super::path::PathTable;
use super::scorer::Scorer;
use super::{LARGE_FLOW_BYTES, LOAD_BALANCE_TOLERANCE, STICKINESS_BONUS};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::types::{Packet, SimTime, WorkloadType};

/// How a path was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Best score among healthy paths.
    Adaptive,
    /// Round-robin over all paths.
    RoundRobin,
    /// Weighted choice among `candidates` near-equal paths.
    LoadBalanced { candidates: usize },
}

/// Outcome of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Chosen path.
    pub path: usize,
    /// Base candidate before the tie-break.
    pub base: usize,
    /// Stage that produced `path`.
    pub decision: Decision,
}

/// Path selector.
pub struct PathSelector {
    adaptive: bool,
    load_balancing: bool,
    scorer: Scorer,
    rr_cursor: usize,
    rng: ChaCha8Rng,
}

impl PathSelector {
    /// Create a selector from router configuration.
    pub fn new(config: &RouterConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);

        Self {
            adaptive: config.adaptive_routing,
            load_balancing: config.load_balancing,
            scorer: Scorer::new(config.failure_recovery.as_secs_f64()),
            rr_cursor: 0,
            rng,
        }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Choose a path for a packet of `flow`.
    ///
    /// Fails with `NoHealthyPath` when adaptive routing finds no healthy
    /// path; round-robin never fails.
    pub fn select(&mut self, flow: &mut Flow, paths: &PathTable, now: SimTime) -> Result<Selection> {
        let (base, decision) = if self.adaptive {
            let best = self
                .best_adaptive(flow, paths, now)
                .ok_or(Error::NoHealthyPath)?;
            flow.record_path(best);
            (best, Decision::Adaptive)
        } else {
            (self.next_round_robin(paths.len()), Decision::RoundRobin)
        };

        let mut selection = Selection {
            path: base,
            base,
            decision,
        };

        if self.load_balancing {
            if let Some((path, candidates)) = self.load_balance(base, flow.is_priority, paths, now) {
                selection.path = path;
                selection.decision = Decision::LoadBalanced { candidates };
            }
        }

        trace!(
            base = selection.base,
            path = selection.path,
            decision = ?selection.decision,
            "Path selected"
        );

        Ok(selection)
    }

    /// Highest-scoring healthy path. Earlier paths win ties.
    fn best_adaptive(&self, flow: &Flow, paths: &PathTable, now: SimTime) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for path in paths.healthy_paths(now) {
            let mut score = self.scorer.score(paths, path, flow.is_priority, now);
            if flow.has_used(path) {
                score *= STICKINESS_BONUS;
            }

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((path, score));
            }
        }

        best.map(|(path, _)| path)
    }

    fn next_round_robin(&mut self, len: usize) -> usize {
        let idx = self.rr_cursor % len.max(1);
        self.rr_cursor = self.rr_cursor.wrapping_add(1);
        idx
    }

    /// Spread traffic over healthy paths scoring close to `base`.
    ///
    /// Returns the chosen path and the candidate count, or `None` when no
    /// healthy path qualifies.
    fn load_balance(
        &mut self,
        base: usize,
        is_priority: bool,
        paths: &PathTable,
        now: SimTime,
    ) -> Option<(usize, usize)> {
        let base_score = self.scorer.score(paths, base, is_priority, now);

        let candidates: Vec<usize> = paths
            .healthy_paths(now)
            .filter(|&p| {
                let score = self.scorer.score(paths, p, is_priority, now);
                (score - base_score).abs() < LOAD_BALANCE_TOLERANCE
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let chosen = self.weighted_choice(&candidates, paths);
        Some((chosen, candidates.len()))
    }

    /// Random choice weighted by spare capacity (1 - utilization).
    fn weighted_choice(&mut self, candidates: &[usize], paths: &PathTable) -> usize {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&p| paths.get(p).map_or(0.0, |m| 1.0 - m.utilization))
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            let idx = self.next_round_robin(candidates.len());
            return candidates[idx];
        }

        let pick = self.rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (&path, weight) in candidates.iter().zip(&weights) {
            cumulative += weight;
            if pick <= cumulative {
                return path;
            }
        }

        candidates[candidates.len() - 1]
    }
}

impl std::fmt::Debug for PathSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSelector")
            .field("adaptive", &self.adaptive)
            .field("load_balancing", &self.load_balancing)
            .field("rr_cursor", &self.rr_cursor)
            .finish_non_exhaustive()
    }
}

/// Workload traits noticed while routing a packet.
///
/// Telemetry only: routing does not act on these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadObservation {
    /// Priority flow past the large-flow threshold.
    pub large_flow: bool,
    /// Packet belongs to an AllReduce collective.
    pub collective_pattern: bool,
}

impl WorkloadObservation {
    pub fn is_empty(self) -> bool {
        !self.large_flow && !self.collective_pattern
    }
}

/// Inspect a packet and its flow for workload-specific traits.
pub fn observe_workload(flow: &Flow, packet: &Packet) -> WorkloadObservation {
    let collective_pattern = match packet.workload {
        Some(workload) => workload == WorkloadType::AllReduce,
        None => packet.tag.contains("AllReduce"),
    };

    WorkloadObservation {
        large_flow: flow.is_priority && flow.total_bytes > LARGE_FLOW_BYTES,
        collective_pattern,
    }
}
