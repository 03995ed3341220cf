//! Core types used throughout Pathweave.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point on the simulated timeline, in seconds.
///
/// Totally ordered (`f64::total_cmp`) so it can key the event queue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: Self = Self(0.0);

    /// Create from seconds. Negative and NaN inputs are pinned to zero.
    pub fn from_secs(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 {
            Self::ZERO
        } else {
            Self(secs)
        }
    }

    pub fn from_millis(millis: f64) -> Self {
        Self::from_secs(millis / 1000.0)
    }

    pub fn from_duration(d: Duration) -> Self {
        Self(d.as_secs_f64())
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` is later).
    pub fn since(self, earlier: Self) -> f64 {
        self.0 - earlier.0
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_secs_f64())
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: Self) -> f64 {
        self.since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

/// Traffic classification carried as packet metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrafficClass {
    /// Ordinary best-effort traffic
    #[default]
    Standard,
    /// Collective communication (AllReduce, AllGather, RDMA over Ethernet)
    Collective,
    /// Bulk storage replication
    Storage,
    /// Control-plane messages
    Control,
}

impl TrafficClass {
    /// Tag fragments that mark a packet as collective traffic when the
    /// generator did not set an explicit class.
    const COLLECTIVE_MARKERS: [&'static str; 4] = ["AI", "AllReduce", "AllGather", "RoCE"];

    /// Infer a class from a packet tag.
    pub fn from_tag(tag: &str) -> Self {
        if Self::COLLECTIVE_MARKERS.iter().any(|m| tag.contains(m)) {
            Self::Collective
        } else {
            Self::Standard
        }
    }

    pub fn is_priority(self) -> bool {
        matches!(self, Self::Collective)
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Collective => write!(f, "collective"),
            Self::Storage => write!(f, "storage"),
            Self::Control => write!(f, "control"),
        }
    }
}

/// Collective-operation workload that produced a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadType {
    AllReduce,
    AllGather,
    ReduceScatter,
    PointToPoint,
    Broadcast,
    AllToAll,
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllReduce => write!(f, "AllReduce"),
            Self::AllGather => write!(f, "AllGather"),
            Self::ReduceScatter => write!(f, "ReduceScatter"),
            Self::PointToPoint => write!(f, "P2P"),
            Self::Broadcast => write!(f, "Broadcast"),
            Self::AllToAll => write!(f, "AllToAll"),
        }
    }
}

/// Opaque packet handed to the router by a traffic source.
///
/// Only coarse metadata is available; the router never parses headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Source-assigned identifier (informational).
    #[serde(default)]
    pub id: u64,
    /// Declared size in bytes. Trimming rewrites this.
    pub bytes: u64,
    /// Creation timestamp, if the source stamped one.
    #[serde(default)]
    pub created_at: Option<SimTime>,
    /// Sender identity.
    #[serde(default)]
    pub sender: Option<u32>,
    /// Name/tag string.
    #[serde(default)]
    pub tag: String,
    /// Packet-kind field.
    #[serde(default)]
    pub kind: u32,
    /// Explicit traffic class set by the generator.
    #[serde(default)]
    pub class: Option<TrafficClass>,
    /// Collective workload marker.
    #[serde(default)]
    pub workload: Option<WorkloadType>,
    /// High-priority marker.
    #[serde(default)]
    pub priority: bool,
}

impl Packet {
    /// Create an unlabelled packet of the given size.
    pub fn new(id: u64, bytes: u64) -> Self {
        Self {
            id,
            bytes,
            created_at: None,
            sender: None,
            tag: String::new(),
            kind: 0,
            class: None,
            workload: None,
            priority: false,
        }
    }

    pub fn with_sender(mut self, sender: u32) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_class(mut self, class: TrafficClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_workload(mut self, workload: WorkloadType) -> Self {
        self.workload = Some(workload);
        self
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    pub fn created_at(mut self, at: SimTime) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Size on the wire in bits.
    pub fn bits(&self) -> u64 {
        self.bytes.saturating_mul(8)
    }

    /// Effective traffic class: explicit if set, otherwise inferred from the tag.
    pub fn traffic_class(&self) -> TrafficClass {
        self.class.unwrap_or_else(|| TrafficClass::from_tag(&self.tag))
    }

    /// Whether this packet marks its flow as priority traffic.
    pub fn is_priority(&self) -> bool {
        self.priority || self.workload.is_some() || self.traffic_class().is_priority()
    }
}
