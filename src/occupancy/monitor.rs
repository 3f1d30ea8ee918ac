//! Periodic stuck-state detection.
//!
//! Every check period the monitor looks at the reconciler's state:
//!
//! - occupied without any recorded motion is impossible; repair it through the
//!   normal clear transition;
//! - occupied and motionless past the warning threshold means the auto-clear
//!   timer is not doing its job; warn;
//! - no frame from the device for an hour; warn.
//!
//! The next tick is armed before the check runs, so a failing check never
//! stops monitoring.

use super::Timings;
use super::reconciler::OccupancyReconciler;
use super::state::OccupancyState;
use crate::clusters::AttributeSink;
use crate::error::{BridgeError, Result};
use crate::timer::{TimerFired, TimerKind, TimerSlot};
use log::{debug, warn};
use tokio::time::{Duration, Instant};

/// Outcome of one stuck-state evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StuckCheck {
    /// Occupied with no motion timestamp; must be cleared.
    pub repair: bool,
    /// Occupied and motionless longer than the warning threshold.
    pub long_occupied: bool,
    /// No communication for longer than the silence threshold.
    pub silent: bool,
}

pub struct StuckStateMonitor {
    timer: TimerSlot,
    timings: Timings,
    checks_run: u64,
    failed_checks: u64,
}

impl StuckStateMonitor {
    pub fn new(timings: Timings) -> Self {
        Self {
            timer: TimerSlot::new(TimerKind::StuckCheck),
            timings,
            checks_run: 0,
            failed_checks: 0,
        }
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run
    }

    pub fn failed_checks(&self) -> u64 {
        self.failed_checks
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Arm the first tick.
    pub fn start<S: AttributeSink>(&mut self, reconciler: &OccupancyReconciler<S>) {
        self.schedule_next(reconciler);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// Handle a fired timer. Returns whether it was this monitor's tick.
    pub fn on_tick<S: AttributeSink>(
        &mut self,
        fired: TimerFired,
        reconciler: &mut OccupancyReconciler<S>,
    ) -> bool {
        if !self.timer.accept(fired) {
            return false;
        }

        self.schedule_next(reconciler);
        self.checks_run += 1;

        let check = self.evaluate(reconciler.state(), Instant::now());
        self.apply(check, reconciler);
        true
    }

    /// Run both checks on `state` at `now`.
    ///
    /// The occupancy and silence checks are independent; a failure in one is
    /// logged and counted and the other still reports.
    pub fn evaluate(&mut self, state: &OccupancyState, now: Instant) -> StuckCheck {
        let mut check = match Self::check_occupancy(state, now, &self.timings) {
            Ok(check) => check,
            Err(e) => {
                self.note_failure(e);
                StuckCheck::default()
            }
        };
        match Self::check_silence(state, now, &self.timings) {
            Ok(silent) => check.silent = silent,
            Err(e) => self.note_failure(e),
        }
        check
    }

    /// Repair and long-occupied checks. Never sets `silent`.
    pub fn check_occupancy(
        state: &OccupancyState,
        now: Instant,
        timings: &Timings,
    ) -> Result<StuckCheck> {
        let mut check = StuckCheck::default();

        if state.occupied && (state.last_motion_at.is_none() || state.occupied_since.is_none()) {
            check.repair = true;
        } else if state.occupied {
            let occupied_for = elapsed(now, state.occupied_since, "occupied duration")?;
            let since_motion = elapsed(now, state.last_motion_at, "time since motion")?;
            check.long_occupied = occupied_for > timings.stuck_warning_threshold
                && since_motion > timings.stuck_warning_threshold;
        }

        Ok(check)
    }

    /// Whether the device has been silent past the warning threshold.
    pub fn check_silence(state: &OccupancyState, now: Instant, timings: &Timings) -> Result<bool> {
        let silent_for = elapsed(now, Some(state.last_communication_at), "device silence")?;
        Ok(silent_for > timings.silence_warning_threshold)
    }

    fn note_failure(&mut self, e: BridgeError) {
        self.failed_checks += 1;
        warn!("[Monitor] Stuck-state check failed: {}", e);
    }

    fn apply<S: AttributeSink>(&self, check: StuckCheck, reconciler: &mut OccupancyReconciler<S>) {
        if check.repair {
            warn!("[Monitor] Occupied without a recorded motion timestamp, forcing clear");
            reconciler.note_stuck_warning();
            reconciler.clear_occupancy();
        }

        if check.long_occupied {
            reconciler.note_stuck_warning();
            warn!(
                "[Monitor] Occupied for over {}s with no motion, auto-clear may not be armed (warning #{})",
                self.timings.stuck_warning_threshold.as_secs(),
                reconciler.state().stuck_warning_count()
            );
        }

        if check.silent {
            reconciler.note_stuck_warning();
            warn!(
                "[Monitor] No communication from device for over {}s",
                self.timings.silence_warning_threshold.as_secs()
            );
        }

        if check == StuckCheck::default() {
            debug!("[Monitor] State consistent");
        }
    }

    fn schedule_next<S: AttributeSink>(&mut self, reconciler: &OccupancyReconciler<S>) {
        if let Err(e) = self
            .timer
            .arm(reconciler.scheduler(), self.timings.stuck_check_period)
        {
            warn!("[Monitor] Could not schedule next stuck-state check: {}", e);
        }
    }
}

fn elapsed(now: Instant, at: Option<Instant>, what: &'static str) -> Result<Duration> {
    match at {
        Some(at) => now
            .checked_duration_since(at)
            .ok_or(BridgeError::ClockWentBackwards(what)),
        None => Ok(Duration::ZERO),
    }
}
