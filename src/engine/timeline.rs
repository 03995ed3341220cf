//! Ordered event timeline.
//!
//! Events are processed in a deterministic order:
//! 1. Event time (earlier first)
//! 2. Insertion sequence (FIFO for equal times)
//!
//! Periodic timers are single pending events keyed by [`TimerKind`]. Each
//! arming bumps a generation counter; cancelled or superseded timer events
//! stay in the heap but are discarded when they surface.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use tracing::trace;

use crate::types::{Packet, SimTime};

/// Recurring maintenance timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Inactivity sweep of the failure detector.
    FailureDetection,
    /// Congestion level and weight refresh.
    CongestionRefresh,
    /// Telemetry snapshot.
    Telemetry,
    /// Idle flow eviction.
    FlowExpiry,
}

impl TimerKind {
    pub const ALL: [Self; 4] = [
        Self::FailureDetection,
        Self::CongestionRefresh,
        Self::Telemetry,
        Self::FlowExpiry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailureDetection => "failure_detection",
            Self::CongestionRefresh => "congestion_refresh",
            Self::Telemetry => "telemetry",
            Self::FlowExpiry => "flow_expiry",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happens on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A packet reaches the router.
    Arrival(Packet),
    /// A periodic timer fires.
    Timer(TimerKind),
}

#[derive(Debug)]
enum Entry {
    Arrival(Packet),
    Timer { kind: TimerKind, generation: u64 },
}

#[derive(Debug)]
struct Scheduled {
    at: SimTime,
    seq: u64,
    entry: Entry,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Single ordered timeline of arrivals and timers.
#[derive(Debug, Default)]
pub struct Timeline {
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    now: SimTime,
    armed: HashMap<TimerKind, u64>,
    next_generation: u64,
    pending_arrivals: usize,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the most recently popped event.
    pub fn now(&self) -> SimTime {
        self.now
    }

    fn push(&mut self, at: SimTime, entry: Entry) {
        // Never schedule into the past.
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { at, seq, entry });
    }

    /// Schedule a packet arrival.
    pub fn schedule_arrival(&mut self, at: SimTime, packet: Packet) {
        self.pending_arrivals += 1;
        self.push(at, Entry::Arrival(packet));
    }

    /// Arm `kind` to fire at `at`, replacing any pending instance.
    pub fn arm(&mut self, kind: TimerKind, at: SimTime) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.armed.insert(kind, generation);
        self.push(at, Entry::Timer { kind, generation });
        trace!(timer = %kind, %at, "Timer armed");
    }

    /// Cancel the pending instance of `kind`. Returns whether one was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Cancel every timer. Pending arrivals are kept.
    pub fn shutdown(&mut self) {
        self.armed.clear();
        // Drop the stale timer entries right away.
        let queue = std::mem::take(&mut self.queue);
        self.queue = queue
            .into_iter()
            .filter(|s| matches!(s.entry, Entry::Arrival(_)))
            .collect();
    }

    fn is_live(&self, entry: &Entry) -> bool {
        match entry {
            Entry::Arrival(_) => true,
            Entry::Timer { kind, generation } => self.armed.get(kind) == Some(generation),
        }
    }

    fn discard_stale(&mut self) {
        while let Some(head) = self.queue.peek() {
            if self.is_live(&head.entry) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Time of the next live event.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_stale();
        self.queue.peek().map(|s| s.at)
    }

    /// Pop the next live event and advance the clock to it.
    ///
    /// A fired timer is disarmed; re-arm it to keep it recurring.
    pub fn pop(&mut self) -> Option<(SimTime, Event)> {
        self.discard_stale();
        let scheduled = self.queue.pop()?;
        self.now = scheduled.at;

        let event = match scheduled.entry {
            Entry::Arrival(packet) => {
                self.pending_arrivals -= 1;
                Event::Arrival(packet)
            }
            Entry::Timer { kind, .. } => {
                self.armed.remove(&kind);
                Event::Timer(kind)
            }
        };

        Some((scheduled.at, event))
    }

    /// Arrivals not yet popped.
    pub fn pending_arrivals(&self) -> usize {
        self.pending_arrivals
    }

    /// Whether no live event remains.
    pub fn is_empty(&mut self) -> bool {
        self.peek_time().is_none()
    }
}
