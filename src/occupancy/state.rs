//! Reconciled occupancy state and its diagnostic snapshot.

use serde::Serialize;
use tokio::time::Instant;

/// State owned by one [`OccupancyReconciler`](super::OccupancyReconciler).
///
/// Invariant: `occupied` holds exactly when `occupied_since` is set. Divergence
/// is an impossible state that the stuck-state monitor repairs.
#[derive(Debug, Clone)]
pub struct OccupancyState {
    pub(crate) occupied: bool,
    pub(crate) occupied_since: Option<Instant>,
    pub(crate) last_motion_at: Option<Instant>,
    pub(crate) last_communication_at: Instant,
    pub(crate) motion_event_count: u64,
    pub(crate) clear_event_count: u64,
    pub(crate) communication_count: u64,
    pub(crate) stuck_warning_count: u64,
    pub(crate) degraded_timer_count: u64,
}

impl OccupancyState {
    /// Fresh, unoccupied state. Activation counts as the last communication.
    pub fn new(now: Instant) -> Self {
        Self {
            occupied: false,
            occupied_since: None,
            last_motion_at: None,
            last_communication_at: now,
            motion_event_count: 0,
            clear_event_count: 0,
            communication_count: 0,
            stuck_warning_count: 0,
            degraded_timer_count: 0,
        }
    }

    pub fn occupied(&self) -> bool {
        self.occupied
    }

    pub fn occupied_since(&self) -> Option<Instant> {
        self.occupied_since
    }

    pub fn last_motion_at(&self) -> Option<Instant> {
        self.last_motion_at
    }

    pub fn last_communication_at(&self) -> Instant {
        self.last_communication_at
    }

    /// Motion transitions, real and synthetic.
    pub fn motion_event_count(&self) -> u64 {
        self.motion_event_count
    }

    pub fn clear_event_count(&self) -> u64 {
        self.clear_event_count
    }

    pub fn communication_count(&self) -> u64 {
        self.communication_count
    }

    pub fn stuck_warning_count(&self) -> u64 {
        self.stuck_warning_count
    }

    /// Times an auto-clear timer could not be armed.
    pub fn degraded_timer_count(&self) -> u64 {
        self.degraded_timer_count
    }

    pub fn snapshot(&self, now: Instant) -> OccupancySnapshot {
        let secs = |t: Instant| now.saturating_duration_since(t).as_secs_f64();
        OccupancySnapshot {
            occupied: self.occupied,
            occupied_for_secs: self.occupied_since.map(secs),
            secs_since_motion: self.last_motion_at.map(secs),
            secs_since_communication: secs(self.last_communication_at),
            motion_event_count: self.motion_event_count,
            clear_event_count: self.clear_event_count,
            communication_count: self.communication_count,
            stuck_warning_count: self.stuck_warning_count,
            degraded_timer_count: self.degraded_timer_count,
        }
    }
}

/// Point-in-time diagnostics, suitable for logging as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancySnapshot {
    pub occupied: bool,
    pub occupied_for_secs: Option<f64>,
    pub secs_since_motion: Option<f64>,
    pub secs_since_communication: f64,
    pub motion_event_count: u64,
    pub clear_event_count: u64,
    pub communication_count: u64,
    pub stuck_warning_count: u64,
    pub degraded_timer_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    #[test]
    fn test_new_state_is_unoccupied() {
        let state = OccupancyState::new(Instant::now());
        assert!(!state.occupied());
        assert!(state.occupied_since().is_none());
        assert!(state.last_motion_at().is_none());
        assert_eq!(state.motion_event_count(), 0);
    }

    #[test]
    fn test_snapshot_ages() {
        let start = Instant::now();
        let mut state = OccupancyState::new(start);
        state.occupied = true;
        state.occupied_since = Some(start);
        state.last_motion_at = Some(start);
        state.motion_event_count = 1;

        let snapshot = state.snapshot(start + Duration::from_secs(10));
        assert!(snapshot.occupied);
        assert_eq!(snapshot.occupied_for_secs, Some(10.0));
        assert_eq!(snapshot.secs_since_motion, Some(10.0));
        assert_eq!(snapshot.secs_since_communication, 10.0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["motion_event_count"], 1);
        assert_eq!(json["occupied"], true);
    }
}
