//! # Pathweave
//!
//! Adaptive multi-path packet router driven by live per-path telemetry.
//!
//! For every arriving packet the router picks one of several egress paths
//! using congestion, latency and failure telemetry, per-flow stickiness,
//! weighted load balancing and workload-aware classification, then applies
//! congestion mitigation (packet trimming) before dispatch.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │             Event Timeline (arrivals + periodic timers)         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                             Router                              │
//! │  ┌────────────┐  ┌──────────────┐  ┌─────────────────────────┐  │
//! │  │ Flow Table │─▶│ Path Selector│─▶│  Congestion Controller  │  │
//! │  └────────────┘  └──────┬───────┘  └────────────┬────────────┘  │
//! │                  ┌──────▼───────┐               │               │
//! │                  │Scoring Engine│               │               │
//! │                  └──────┬───────┘               │               │
//! ├─────────────────────────▼─────────────────────────▼─────────────┤
//! │          Path Metrics Store  ◀──  Failure Detector (sweep)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        Transmitter / Observers (link model, sinks, telemetry)   │
//! └─────────────────────────────────────────────────────────────────┘
//!
//! Everything runs on a single cooperative timeline: each packet's full
//! decision completes before the next event is considered, so the flow
//! table and the path metrics are plain owned state with no locking.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_possible_truncation)]  // Weights and trimmed sizes
#![allow(clippy::cast_sign_loss)]            // Scores are always positive
#![allow(clippy::cast_precision_loss)]       // Acceptable for stats
#![allow(clippy::suboptimal_flops)]          // Clarity over micro-optimization
#![allow(clippy::struct_excessive_bools)]    // Boolean feature flags are appropriate
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod routing;
pub mod trace;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Packets larger than this are eligible for trimming under congestion.
pub const TRIM_ELIGIBLE_BYTES: u64 = 1500;

/// Smallest size a trimmed packet may shrink to (header remnant).
pub const MIN_TRIMMED_BYTES: u64 = 64;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, RouterConfig};
    pub use crate::engine::{Engine, Recorder, RouterObserver, Timeline, TimerKind, Transmitter};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{RunSummary, TelemetrySnapshot};
    pub use crate::routing::{
        Decision, Dispatch, DropReason, Flow, FlowKey, FlowTable, PathHealth, PathMetrics,
        PathSelector, PathTable, RouteOutcome, Router, Scorer,
    };
    pub use crate::types::*;
}
