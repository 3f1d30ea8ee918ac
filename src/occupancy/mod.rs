//! Occupancy reconciliation for motion sensors with unreliable clear frames.
//!
//! The hardware sometimes never sends "motion cleared", and sometimes sends a
//! clear when it really means "new motion, I reset before telling you". The
//! reconciler turns that stream into a clean occupied/unoccupied signal using a
//! software timeout and a duration heuristic; the stuck-state monitor and the
//! startup reconciler repair whatever the heuristics cannot.

pub mod monitor;
pub mod reconciler;
pub mod startup;
pub mod state;
pub mod subsystem;

#[cfg(test)]
pub(crate) mod test_support;

pub use monitor::{StuckCheck, StuckStateMonitor};
pub use reconciler::OccupancyReconciler;
pub use startup::StartupReconciler;
pub use state::{OccupancySnapshot, OccupancyState};
pub use subsystem::{OccupancySubsystem, SubsystemHandle};

use tokio::time::Duration;

/// Occupied to unoccupied auto-clear delay after the last motion.
pub const MOTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Minimum occupied duration before a clear is read as new motion.
pub const STUCK_MOTION_THRESHOLD: Duration = Duration::from_secs(30);

/// Occupied (and motionless) duration that triggers a diagnostic warning.
pub const STUCK_WARNING_THRESHOLD: Duration = Duration::from_secs(1800);

/// Stuck-state monitor cadence.
pub const STUCK_CHECK_PERIOD: Duration = Duration::from_secs(300);

/// Delay before the startup reconciler forces a clear.
pub const STARTUP_GRACE: Duration = Duration::from_secs(5);

/// Device silence that triggers a diagnostic warning.
pub const SILENCE_WARNING_THRESHOLD: Duration = Duration::from_secs(3600);

/// Policy durations for one subsystem.
///
/// Fixed at construction. Production code always uses `Timings::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub motion_timeout: Duration,
    pub stuck_motion_threshold: Duration,
    pub stuck_warning_threshold: Duration,
    pub stuck_check_period: Duration,
    pub startup_grace: Duration,
    pub silence_warning_threshold: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            motion_timeout: MOTION_TIMEOUT,
            stuck_motion_threshold: STUCK_MOTION_THRESHOLD,
            stuck_warning_threshold: STUCK_WARNING_THRESHOLD,
            stuck_check_period: STUCK_CHECK_PERIOD,
            startup_grace: STARTUP_GRACE,
            silence_warning_threshold: SILENCE_WARNING_THRESHOLD,
        }
    }
}
