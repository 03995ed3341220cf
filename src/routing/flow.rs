//! Per-flow state: counters, path history and classification.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::PATH_HISTORY_LEN;
use crate::types::{Packet, SimTime, TrafficClass};

/// Packet kinds are folded into this many buckets for the flow key.
const KIND_BUCKETS: u32 = 1000;

/// Identity of a flow, derived from coarse packet metadata.
///
/// Distinct flows may collide on the same key; they are then tracked as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowKey {
    /// Key built from sender, tag and kind bucket.
    Labeled {
        sender: Option<u32>,
        tag: String,
        kind_bucket: u32,
    },
    /// Packet without enough metadata to identify a flow.
    Anonymous(u64),
}

impl FlowKey {
    /// Derive the key for `packet`, or `None` when it carries neither a
    /// sender nor a tag.
    pub fn derive(packet: &Packet) -> Option<Self> {
        if packet.sender.is_none() && packet.tag.is_empty() {
            return None;
        }

        Some(Self::Labeled {
            sender: packet.sender,
            tag: packet.tag.clone(),
            kind_bucket: packet.kind % KIND_BUCKETS,
        })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Labeled { sender: Some(s), tag, kind_bucket } => write!(f, "{s}_{tag}_{kind_bucket}"),
            Self::Labeled { sender: None, tag, kind_bucket } => write!(f, "?_{tag}_{kind_bucket}"),
            Self::Anonymous(n) => write!(f, "anon#{n}"),
        }
    }
}

/// State of one flow.
#[derive(Debug, Clone)]
pub struct Flow {
    /// First packet arrival.
    pub start_time: SimTime,
    /// Most recent packet arrival.
    pub last_seen: SimTime,
    /// Bytes accounted to the flow (declared sizes, before trimming).
    pub total_bytes: u64,
    /// Packets accounted to the flow.
    pub packet_count: u64,
    /// Classification fixed at creation.
    pub class: TrafficClass,
    /// Whether the flow receives priority scoring.
    pub is_priority: bool,
    history: VecDeque<usize>,
}

impl Flow {
    fn new(packet: &Packet, now: SimTime) -> Self {
        Self {
            start_time: now,
            last_seen: now,
            total_bytes: 0,
            packet_count: 0,
            class: packet.traffic_class(),
            is_priority: packet.is_priority(),
            history: VecDeque::with_capacity(PATH_HISTORY_LEN + 1),
        }
    }

    fn account(&mut self, packet: &Packet, now: SimTime) {
        self.total_bytes = self.total_bytes.saturating_add(packet.bytes);
        self.packet_count = self.packet_count.saturating_add(1);
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Recent paths, oldest first.
    pub fn path_history(&self) -> &VecDeque<usize> {
        &self.history
    }

    /// Whether `path` is among the recently used paths.
    pub fn has_used(&self, path: usize) -> bool {
        self.history.contains(&path)
    }

    /// Append a decision, evicting the oldest beyond the history length.
    pub fn record_path(&mut self, path: usize) {
        self.history.push_back(path);
        while self.history.len() > PATH_HISTORY_LEN {
            self.history.pop_front();
        }
    }

    /// Seconds since the last packet of the flow.
    pub fn idle_secs(&self, now: SimTime) -> f64 {
        now.since(self.last_seen).max(0.0)
    }
}

/// Table of active flows.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: HashMap<FlowKey, Flow>,
    next_anonymous: u64,
    total_created: u64,
    evicted: u64,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the key for `packet`, minting a fresh anonymous key when the
    /// metadata is insufficient.
    pub fn key_for(&mut self, packet: &Packet) -> FlowKey {
        FlowKey::derive(packet).unwrap_or_else(|| {
            let key = FlowKey::Anonymous(self.next_anonymous);
            self.next_anonymous += 1;
            key
        })
    }

    /// Get or create the flow for `key` and account `packet` to it.
    pub fn lookup_or_create(&mut self, key: FlowKey, packet: &Packet, now: SimTime) -> &mut Flow {
        let created = &mut self.total_created;
        let flow = self.flows.entry(key).or_insert_with_key(|key| {
            *created += 1;
            let flow = Flow::new(packet, now);
            debug!(flow = %key, class = %flow.class, priority = flow.is_priority, "New flow");
            flow
        });
        flow.account(packet, now);
        flow
    }

    pub fn get(&self, key: &FlowKey) -> Option<&Flow> {
        self.flows.get(key)
    }

    /// Currently tracked flows.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Distinct flows seen since startup, including evicted ones.
    pub fn total_created(&self) -> u64 {
        self.total_created
    }

    /// Anonymous flows minted since startup.
    pub fn anonymous_created(&self) -> u64 {
        self.next_anonymous
    }

    /// Flows removed by idle expiry.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &Flow)> {
        self.flows.iter()
    }

    /// Drop flows idle for longer than `timeout`. Returns how many went.
    pub fn evict_idle(&mut self, now: SimTime, timeout: Duration) -> usize {
        let before = self.flows.len();
        let timeout = timeout.as_secs_f64();
        self.flows.retain(|_, flow| flow.idle_secs(now) <= timeout);
        let removed = before - self.flows.len();
        self.evicted += removed as u64;
        removed
    }
}
