//! Congestion detection, packet trimming and periodic congestion refresh.

use tracing::{debug, trace};

use super::path::PathTable;
use super::{QUEUE_BACKLOG_DEPTH, QUEUE_BACKLOG_PENALTY};
use crate::config::RouterConfig;
use crate::types::Packet;
use crate::{MIN_TRIMMED_BYTES, TRIM_ELIGIBLE_BYTES};

/// A size reduction applied to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trim {
    /// Size before trimming.
    pub from: u64,
    /// Size after trimming.
    pub to: u64,
}

impl Trim {
    /// Bytes removed.
    pub fn saved(self) -> u64 {
        self.from - self.to
    }
}

/// Size of a trimmed packet: three quarters of the declared size, never below
/// [`MIN_TRIMMED_BYTES`]. Packets up to [`TRIM_ELIGIBLE_BYTES`] keep their size.
pub fn trimmed_size(bytes: u64) -> u64 {
    if bytes <= TRIM_ELIGIBLE_BYTES {
        return bytes;
    }
    (bytes / 4 * 3 + bytes % 4 * 3 / 4).max(MIN_TRIMMED_BYTES)
}

/// Congestion controller.
#[derive(Debug, Clone)]
pub struct CongestionController {
    enabled: bool,
    trimming: bool,
    threshold: f64,
}

impl CongestionController {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            enabled: config.congestion_control,
            trimming: config.packet_trimming,
            threshold: config.congestion_threshold,
        }
    }

    /// Whether congestion control is active at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `path` is past the congestion threshold.
    ///
    /// Unknown paths are reported congested.
    pub fn is_congested(&self, paths: &PathTable, path: usize) -> bool {
        paths
            .get(path)
            .map_or(true, |m| m.congestion_level > self.threshold)
    }

    /// Mitigate congestion on `path` for `packet`.
    ///
    /// Only trimming is implemented; it applies when congestion control and
    /// trimming are enabled, the path is congested and the packet is larger
    /// than [`TRIM_ELIGIBLE_BYTES`].
    pub fn mitigate(&self, paths: &PathTable, path: usize, packet: &mut Packet) -> Option<Trim> {
        if !self.enabled || !self.trimming || !self.is_congested(paths, path) {
            return None;
        }
        apply_trim(packet)
    }

    /// Recompute every path's congestion level from utilization and queue
    /// backlog, then refresh load-balancing weights if requested.
    pub fn periodic_refresh(&self, paths: &mut PathTable, load_balancing: bool) {
        for path in 0..paths.len() {
            let Some(metrics) = paths.get(path) else {
                continue;
            };
            let mut level = metrics.utilization;
            if metrics.queue_depth > QUEUE_BACKLOG_DEPTH {
                level += QUEUE_BACKLOG_PENALTY;
            }
            if paths.set_congestion_level(path, level).is_ok() && level > self.threshold {
                trace!(path, level, "Path congested");
            }
        }

        if load_balancing {
            paths.recompute_weights();
        }

        debug!(paths = paths.len(), "Congestion refreshed");
    }
}

/// Trim `packet` in place. Returns the trim when the size changed.
pub fn apply_trim(packet: &mut Packet) -> Option<Trim> {
    let from = packet.bytes;
    let to = trimmed_size(from);
    if to == from {
        return None;
    }
    packet.bytes = to;
    trace!(packet = packet.id, from, to, "Packet trimmed");
    Some(Trim { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(enabled: bool) -> CongestionController {
        CongestionController::new(&RouterConfig {
            congestion_control: enabled,
            ..RouterConfig::default()
        })
    }

    #[test]
    fn test_trimmed_size() {
        assert_eq!(trimmed_size(1500), 1500);
        assert_eq!(trimmed_size(40), 40);
        assert_eq!(trimmed_size(1501), 1125);
        assert_eq!(trimmed_size(4000), 3000);
        assert_eq!(trimmed_size(9000), 6750);
    }

    #[test]
    fn test_trim_bounds() {
        for bytes in [1501u64, 2000, 9000, 65_535, 1_000_000] {
            let to = trimmed_size(bytes);
            assert!(to >= MIN_TRIMMED_BYTES);
            assert!(to <= bytes);
            assert!(to < bytes);
        }
    }

    #[test]
    fn test_mitigate_only_when_congested() {
        let c = controller(true);
        let mut paths = PathTable::new(2);
        paths.set_congestion_level(1, 0.95).unwrap();

        let mut p = Packet::new(0, 9000);
        assert_eq!(c.mitigate(&paths, 0, &mut p), None);
        assert_eq!(p.bytes, 9000);

        let trim = c.mitigate(&paths, 1, &mut p).unwrap();
        assert_eq!(trim, Trim { from: 9000, to: 6750 });
        assert_eq!(trim.saved(), 2250);
        assert_eq!(p.bytes, 6750);
    }

    #[test]
    fn test_mitigate_disabled() {
        let c = controller(false);
        let mut paths = PathTable::new(1);
        paths.set_congestion_level(0, 1.0).unwrap();
        let mut p = Packet::new(0, 9000);
        assert_eq!(c.mitigate(&paths, 0, &mut p), None);
        assert_eq!(p.bytes, 9000);
    }

    #[test]
    fn test_small_packets_not_trimmed() {
        let c = controller(true);
        let mut paths = PathTable::new(1);
        paths.set_congestion_level(0, 1.0).unwrap();
        let mut p = Packet::new(0, 1200);
        assert_eq!(c.mitigate(&paths, 0, &mut p), None);
    }

    #[test]
    fn test_unknown_path_is_congested() {
        let c = controller(true);
        let paths = PathTable::new(1);
        assert!(c.is_congested(&paths, 3));
        assert!(!c.is_congested(&paths, 0));
    }

    #[test]
    fn test_periodic_refresh() {
        let c = controller(true);
        let mut paths = PathTable::new(2);
        paths.update_on_route(0, 100_000_000, None).unwrap();
        paths.set_queue_depth(1, 11).unwrap();
        paths.set_congestion_level(1, 0.0).unwrap();

        c.periodic_refresh(&mut paths, true);

        assert!((paths.get(0).unwrap().congestion_level - 0.1).abs() < 1e-12);
        assert!((paths.get(1).unwrap().congestion_level - 0.2).abs() < 1e-12);
        assert_eq!(paths.get(0).unwrap().weight, 9);
        assert_eq!(paths.get(1).unwrap().weight, 10);
    }

    #[test]
    fn test_boundaries_are_strict() {
        let c = controller(true);
        let mut paths = PathTable::new(2);
        paths.set_queue_depth(0, QUEUE_BACKLOG_DEPTH).unwrap();
        paths.set_queue_depth(1, QUEUE_BACKLOG_DEPTH + 1).unwrap();
        c.periodic_refresh(&mut paths, false);
        assert_eq!(paths.get(0).unwrap().congestion_level, 0.0);
        assert!((paths.get(1).unwrap().congestion_level - QUEUE_BACKLOG_PENALTY).abs() < 1e-12);

        let threshold = RouterConfig::default().congestion_threshold;
        paths.set_congestion_level(0, threshold).unwrap();
        assert!(!c.is_congested(&paths, 0));
        let mut p = Packet::new(0, 9000);
        assert_eq!(c.mitigate(&paths, 0, &mut p), None);

        paths.set_congestion_level(0, threshold + 0.01).unwrap();
        assert!(c.is_congested(&paths, 0));
    }
}
