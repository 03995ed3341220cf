//! Discrete-event engine driving the router.
//!
//! The engine owns the [`Router`] and a [`Timeline`] of packet arrivals and
//! periodic timers. Every event runs to completion before the next one is
//! popped, so routing state needs no locking. Routed packets are handed to a
//! [`Transmitter`]; dispatch, drop and telemetry events are reported to a
//! [`RouterObserver`].

mod timeline;

pub use timeline::{Event, Timeline, TimerKind};

use std::time::Duration;

use tracing::{debug, info};

use crate::config::RouterConfig;
use crate::error::Result;
use crate::metrics::{RunSummary, TelemetrySnapshot};
use crate::routing::{Dispatch, DropReason, RouteOutcome, Router};
use crate::types::{Packet, SimTime};

/// Link transmission collaborator: receives every routed packet.
pub trait Transmitter {
    /// Take `packet` onto `path`, leaving the router at `depart_at`.
    fn transmit(&mut self, packet: Packet, path: usize, depart_at: SimTime);
}

/// Transmitter that discards packets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransmitter;

impl Transmitter for NullTransmitter {
    fn transmit(&mut self, _packet: Packet, _path: usize, _depart_at: SimTime) {}
}

impl<F> Transmitter for F
where
    F: FnMut(Packet, usize, SimTime),
{
    fn transmit(&mut self, packet: Packet, path: usize, depart_at: SimTime) {
        self(packet, path, depart_at);
    }
}

/// Observer of routing events. All methods default to no-ops.
pub trait RouterObserver {
    fn on_dispatch(&mut self, _dispatch: &Dispatch) {}

    fn on_drop(&mut self, _packet: &Packet, _reason: DropReason, _at: SimTime) {}

    fn on_telemetry(&mut self, _snapshot: &TelemetrySnapshot) {}
}

impl RouterObserver for () {}

impl<O: RouterObserver + ?Sized> RouterObserver for Box<O> {
    fn on_dispatch(&mut self, dispatch: &Dispatch) {
        (**self).on_dispatch(dispatch);
    }

    fn on_drop(&mut self, packet: &Packet, reason: DropReason, at: SimTime) {
        (**self).on_drop(packet, reason, at);
    }

    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) {
        (**self).on_telemetry(snapshot);
    }
}

impl<A: RouterObserver, B: RouterObserver> RouterObserver for (A, B) {
    fn on_dispatch(&mut self, dispatch: &Dispatch) {
        self.0.on_dispatch(dispatch);
        self.1.on_dispatch(dispatch);
    }

    fn on_drop(&mut self, packet: &Packet, reason: DropReason, at: SimTime) {
        self.0.on_drop(packet, reason, at);
        self.1.on_drop(packet, reason, at);
    }

    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) {
        self.0.on_telemetry(snapshot);
        self.1.on_telemetry(snapshot);
    }
}

/// Observer that keeps everything it is told, for inspection after a run.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub dispatches: Vec<Dispatch>,
    pub drops: Vec<(Packet, DropReason, SimTime)>,
    pub snapshots: Vec<TelemetrySnapshot>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths chosen, in dispatch order.
    pub fn paths(&self) -> Vec<usize> {
        self.dispatches.iter().map(|d| d.path).collect()
    }
}

impl RouterObserver for Recorder {
    fn on_dispatch(&mut self, dispatch: &Dispatch) {
        self.dispatches.push(dispatch.clone());
    }

    fn on_drop(&mut self, packet: &Packet, reason: DropReason, at: SimTime) {
        self.drops.push((packet.clone(), reason, at));
    }

    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) {
        self.snapshots.push(snapshot.clone());
    }
}

/// Event loop around a [`Router`].
pub struct Engine<T, O = ()> {
    router: Router,
    timeline: Timeline,
    transmitter: T,
    observer: O,
}

impl<T: Transmitter> Engine<T, ()> {
    /// Create an engine without an observer.
    pub fn new(config: RouterConfig, transmitter: T) -> Result<Self> {
        Self::with_observer(config, transmitter, ())
    }
}

impl<T: Transmitter, O: RouterObserver> Engine<T, O> {
    /// Create an engine and arm the timers enabled in `config`.
    pub fn with_observer(config: RouterConfig, transmitter: T, observer: O) -> Result<Self> {
        let router = Router::new(config)?;
        let mut engine = Self {
            router,
            timeline: Timeline::new(),
            transmitter,
            observer,
        };

        for kind in TimerKind::ALL {
            if let Some(interval) = engine.interval(kind) {
                engine.timeline.arm(kind, SimTime::ZERO + interval);
            }
        }

        Ok(engine)
    }

    /// Period of `kind`, or `None` when the timer is disabled.
    fn interval(&self, kind: TimerKind) -> Option<Duration> {
        let config = self.router.config();
        match kind {
            TimerKind::FailureDetection => config
                .rapid_failure_detection
                .then_some(config.failure_detection_interval),
            TimerKind::CongestionRefresh => config
                .dynamic_congestion_control
                .then_some(config.congestion_refresh_interval),
            TimerKind::Telemetry => config
                .advanced_telemetry
                .then_some(config.telemetry_interval),
            TimerKind::FlowExpiry => config.flow_idle_timeout,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.timeline.now()
    }

    /// Schedule a packet arrival at `at`.
    pub fn schedule(&mut self, at: SimTime, packet: Packet) {
        self.timeline.schedule_arrival(at, packet);
    }

    /// Process the next event. Returns `false` when none is left.
    pub fn step(&mut self) -> Result<bool> {
        let Some((now, event)) = self.timeline.pop() else {
            return Ok(false);
        };

        match event {
            Event::Arrival(packet) => self.handle_arrival(packet, now)?,
            Event::Timer(kind) => {
                self.handle_timer(kind, now);
                if let Some(interval) = self.interval(kind) {
                    self.timeline.arm(kind, now + interval);
                }
            }
        }

        Ok(true)
    }

    fn handle_arrival(&mut self, packet: Packet, now: SimTime) -> Result<()> {
        match self.router.route(packet, now)? {
            RouteOutcome::Dispatched(dispatch) => {
                self.observer.on_dispatch(&dispatch);
                self.transmitter
                    .transmit(dispatch.packet, dispatch.path, dispatch.depart_at);
            }
            RouteOutcome::Dropped { packet, reason } => {
                self.observer.on_drop(&packet, reason, now);
            }
        }
        Ok(())
    }

    fn handle_timer(&mut self, kind: TimerKind, now: SimTime) {
        match kind {
            TimerKind::FailureDetection => {
                self.router.failure_sweep(now);
            }
            TimerKind::CongestionRefresh => self.router.congestion_refresh(),
            TimerKind::Telemetry => {
                let snapshot = self.router.telemetry(now);
                for p in &snapshot.paths {
                    debug!(
                        path = p.path,
                        utilization = p.utilization,
                        congestion = p.congestion_level,
                        failures = p.failure_count,
                        "Path telemetry"
                    );
                }
                self.observer.on_telemetry(&snapshot);
            }
            TimerKind::FlowExpiry => {
                self.router.expire_flows(now);
            }
        }
    }

    /// Process every event up to and including `end`, then shut down.
    pub fn run_until(&mut self, end: SimTime) -> Result<RunSummary> {
        while self.timeline.peek_time().is_some_and(|t| t <= end) {
            self.step()?;
        }
        self.shutdown();
        Ok(self.router.summary(end.max(self.now())))
    }

    /// Process events until no packet arrival is pending, then shut down.
    ///
    /// Timers keep firing while arrivals remain, and stop with the last one.
    pub fn run(&mut self) -> Result<RunSummary> {
        while self.timeline.pending_arrivals() > 0 {
            if !self.step()? {
                break;
            }
        }
        self.shutdown();
        Ok(self.router.summary(self.now()))
    }

    /// Cancel every pending timer.
    pub fn shutdown(&mut self) {
        self.timeline.shutdown();
        info!(
            at = %self.now(),
            routed = self.router.counters().routed,
            dropped = self.router.counters().dropped(),
            "Engine stopped"
        );
    }

    /// Tear the engine apart into its collaborators.
    pub fn into_parts(self) -> (Router, T, O) {
        (self.router, self.transmitter, self.observer)
    }
}
