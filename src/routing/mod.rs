//! Adaptive multi-path routing.
//!
//! This module implements the per-packet routing core:
//! - Per-path telemetry with exponential smoothing
//! - Per-flow state, stickiness history and traffic classification
//! - Multiplicative path scoring
//! - Adaptive / round-robin selection with weighted load-balanced tie-break
//! - Congestion mitigation (packet trimming) and periodic refresh
//! - Inactivity-based failure detection with time-based recovery

mod congestion;
mod failure;
mod flow;
mod path;
mod router;
mod scorer;
mod selector;

pub use congestion::{apply_trim, trimmed_size, CongestionController, Trim};
pub use failure::FailureDetector;
pub use flow::{Flow, FlowKey, FlowTable};
pub use path::{PathHealth, PathMetrics, PathTable};
pub use router::{Dispatch, DropReason, RouteOutcome, Router};
pub use scorer::Scorer;
pub use selector::{observe_workload, Decision, PathSelector, Selection, WorkloadObservation};

/// Smoothing factor for utilization and latency moving averages.
pub const EMA_ALPHA: f64 = 0.1;

/// Number of recent paths remembered per flow.
pub const PATH_HISTORY_LEN: usize = 10;

/// Score multiplier for paths the flow used recently.
pub const STICKINESS_BONUS: f64 = 1.1;

/// Two paths whose scores differ by less than this are near-equivalent.
pub const LOAD_BALANCE_TOLERANCE: f64 = 0.1;

/// Priority flows beyond this many bytes count as large flows.
pub const LARGE_FLOW_BYTES: u64 = 10 * 1024 * 1024;

/// Queue backlog contribution to congestion per queued packet.
pub const QUEUE_DEPTH_WEIGHT: f64 = 0.01;

/// Queue depth beyond which the periodic refresh adds a backlog penalty.
pub const QUEUE_BACKLOG_DEPTH: u32 = 10;

/// Congestion penalty for a backlogged queue.
pub const QUEUE_BACKLOG_PENALTY: f64 = 0.2;

/// Upper bound of a load-balancing weight.
pub const MAX_PATH_WEIGHT: u32 = 10;
