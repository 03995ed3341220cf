//! Inactivity-based failure detection.
//!
//! A path that has carried no packet for longer than the inactivity
//! threshold is marked failed. The mark is repeated on every sweep while the
//! path stays idle, which keeps it out of selection; once traffic moves
//! again (or the recovery window passes without new marks) it recovers.

use std::time::Duration;

use tracing::{debug, warn};

use super::path::PathTable;
use crate::types::SimTime;

/// Failure detector.
#[derive(Debug, Clone, Copy)]
pub struct FailureDetector {
    inactivity_threshold: Duration,
}

impl FailureDetector {
    pub fn new(inactivity_threshold: Duration) -> Self {
        Self {
            inactivity_threshold,
        }
    }

    pub fn inactivity_threshold(&self) -> Duration {
        self.inactivity_threshold
    }

    /// Mark every path idle past the threshold. Returns the marked paths.
    pub fn sweep(&self, paths: &mut PathTable, now: SimTime) -> Vec<usize> {
        let threshold = self.inactivity_threshold.as_secs_f64();
        let idle: Vec<usize> = (0..paths.len())
            .filter(|&p| paths.idle_secs(p, now).is_some_and(|idle| idle > threshold))
            .collect();

        let mut marked = Vec::with_capacity(idle.len());
        for path in idle.iter().copied() {
            match paths.mark_failure(path, now) {
                Ok(_) => marked.push(path),
                Err(e) => warn!(path, error = %e, "Could not mark idle path"),
            }
        }

        if !marked.is_empty() {
            debug!(count = marked.len(), at = %now, "Idle paths marked");
        }

        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_marks_idle_paths() {
        let detector = FailureDetector::new(Duration::from_millis(100));
        let mut paths = PathTable::new(3);
        paths.touch(1, SimTime::from_secs(0.15)).unwrap();

        let marked = detector.sweep(&mut paths, SimTime::from_secs(0.2));
        assert_eq!(marked, vec![0, 2]);
        assert!(!paths.is_healthy(0, SimTime::from_secs(0.2)));
        assert!(paths.is_healthy(1, SimTime::from_secs(0.2)));
    }

    #[test]
    fn test_sweep_within_threshold_marks_nothing() {
        let detector = FailureDetector::new(Duration::from_millis(100));
        let mut paths = PathTable::new(2);
        assert!(detector.sweep(&mut paths, SimTime::from_secs(0.05)).is_empty());
        assert_eq!(paths.get(0).unwrap().failure_count, 0);
    }

    #[test]
    fn test_repeated_sweeps_accumulate_marks() {
        let detector = FailureDetector::new(Duration::from_millis(100));
        let mut paths = PathTable::new(1);
        detector.sweep(&mut paths, SimTime::from_secs(0.2));
        detector.sweep(&mut paths, SimTime::from_secs(0.3));
        let m = paths.get(0).unwrap();
        assert_eq!(m.failure_count, 2);
        assert_eq!(m.health.last_failure(), Some(SimTime::from_secs(0.3)));
    }

    #[test]
    fn test_sweep_far_future() {
        let detector = FailureDetector::new(Duration::from_millis(100));
        let mut paths = PathTable::new(2);
        let far = SimTime::from_secs(1e20);
        assert_eq!(detector.sweep(&mut paths, far), vec![0, 1]);
        assert!(!paths.is_healthy(0, far));
    }
}
