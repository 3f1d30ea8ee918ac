//! Occupancy state machine.
//!
//! Two states, `UNOCCUPIED` and `OCCUPIED`. Motion always means occupied and
//! restarts the auto-clear deadline. The only way back to unoccupied is the
//! deadline firing (or a forced clear from startup/repair). Clear frames from
//! the hardware are never taken at face value:
//!
//! - clear while unoccupied: the sensor was stuck and is resetting, treat as
//!   motion;
//! - clear after being occupied for at least the stuck-motion threshold: the
//!   firmware reset because of continued activity, treat as motion;
//! - clear sooner than that: ignore it and let the deadline run.
//!
//! The threshold rule is a heuristic. Real motion episodes on this sensor are
//! rarely shorter than the threshold, so an early clear is usually noise and a
//! late clear is usually a firmware reset. It can be wrong both ways.
//!
//! `occupied_since` is set on the rising edge only, so it measures how long the
//! room has been continuously occupied, not time since the last motion.

use super::Timings;
use super::state::OccupancyState;
use crate::bus::MotionListener;
use crate::clusters::{AttributeSink, OccupancySensingAttribute};
use crate::timer::{Scheduler, TimerFired, TimerKind, TimerSlot};
use log::{debug, info, warn};
use tokio::time::Instant;

pub struct OccupancyReconciler<S: AttributeSink> {
    state: OccupancyState,
    timings: Timings,
    scheduler: Scheduler,
    auto_clear_timer: TimerSlot,
    sink: S,
}

impl<S: AttributeSink> OccupancyReconciler<S> {
    pub fn new(sink: S, scheduler: Scheduler, timings: Timings) -> Self {
        Self {
            state: OccupancyState::new(Instant::now()),
            timings,
            scheduler,
            auto_clear_timer: TimerSlot::new(TimerKind::AutoClear),
            sink,
        }
    }

    pub fn state(&self) -> &OccupancyState {
        &self.state
    }

    pub fn is_occupied(&self) -> bool {
        self.state.occupied
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn auto_clear_armed(&self) -> bool {
        self.auto_clear_timer.is_armed()
    }

    /// Hardware (or synthetic) motion.
    pub fn motion_event(&mut self) {
        self.register_motion(false);
    }

    /// Hardware clear frame, disambiguated by the stuck-motion heuristic.
    pub fn motion_clear(&mut self) {
        let now = Instant::now();
        self.state.clear_event_count += 1;
        self.state.last_communication_at = now;

        let Some(since) = self.state.occupied_since else {
            debug!("[Occupancy] Clear received while unoccupied, treating as motion (stuck sensor reset)");
            self.register_motion(false);
            return;
        };

        let occupied_for = now.saturating_duration_since(since);
        if occupied_for >= self.timings.stuck_motion_threshold {
            debug!(
                "[Occupancy] Clear after {}s (>= {}s threshold), treating as new motion",
                occupied_for.as_secs(),
                self.timings.stuck_motion_threshold.as_secs()
            );
            self.register_motion(true);
        } else {
            debug!(
                "[Occupancy] Clear after {}s (< {}s threshold), ignoring, timer will handle it",
                occupied_for.as_secs(),
                self.timings.stuck_motion_threshold.as_secs()
            );
        }
    }

    /// Any frame from the device.
    pub fn communication(&mut self) {
        self.state.communication_count += 1;
        self.state.last_communication_at = Instant::now();
    }

    /// Route a fired timer. Returns whether it was the live auto-clear timer.
    pub fn handle_timer(&mut self, fired: TimerFired) -> bool {
        if !self.auto_clear_timer.accept(fired) {
            return false;
        }
        info!(
            "[Occupancy] Clearing occupancy after {}s without motion",
            self.timings.motion_timeout.as_secs()
        );
        self.clear_occupancy();
        true
    }

    /// Occupied to unoccupied transition. Emits only on a real falling edge.
    pub fn clear_occupancy(&mut self) {
        self.auto_clear_timer.cancel();
        let was_occupied = self.state.occupied;
        self.state.occupied = false;
        self.state.occupied_since = None;
        if was_occupied {
            self.emit(false);
        }
    }

    /// Force unoccupied and tell the host regardless of our own state.
    ///
    /// The host may hold a value restored from a previous session that this
    /// reconciler never produced.
    pub fn force_unoccupied(&mut self) {
        self.auto_clear_timer.cancel();
        self.state.occupied = false;
        self.state.occupied_since = None;
        self.emit(false);
    }

    /// Record a stuck/silent diagnostic warning.
    pub(crate) fn note_stuck_warning(&mut self) {
        self.state.stuck_warning_count += 1;
    }

    pub fn cancel_timers(&mut self) {
        self.auto_clear_timer.cancel();
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut OccupancyState {
        &mut self.state
    }

    /// Motion transition. `reassert` re-emits `occupied` even without a rising
    /// edge; used when a late clear is reinterpreted as a firmware reset.
    fn register_motion(&mut self, reassert: bool) {
        let now = Instant::now();
        self.state.last_motion_at = Some(now);
        self.state.last_communication_at = now;
        self.state.motion_event_count += 1;

        let rising = !self.state.occupied;
        self.state.occupied = true;
        self.state.occupied_since.get_or_insert(now);

        debug!(
            "[Occupancy] Motion detected, starting {}s timer",
            self.timings.motion_timeout.as_secs()
        );
        if let Err(e) = self
            .auto_clear_timer
            .arm(&self.scheduler, self.timings.motion_timeout)
        {
            self.state.degraded_timer_count += 1;
            warn!(
                "[Occupancy] Auto-clear not armed ({}), occupancy holds until the next event",
                e
            );
        }

        if rising {
            info!("[Occupancy] Occupied");
        }
        if rising || reassert {
            self.emit(true);
        }
    }

    fn emit(&self, occupied: bool) {
        self.sink
            .attribute_updated(OccupancySensingAttribute::Occupancy, u8::from(occupied));
    }
}

impl<S: AttributeSink> MotionListener for OccupancyReconciler<S> {
    fn on_motion(&mut self) {
        self.motion_event();
    }

    fn on_motion_clear(&mut self) {
        self.motion_clear();
    }

    fn on_communication(&mut self) {
        self.communication();
    }
}
