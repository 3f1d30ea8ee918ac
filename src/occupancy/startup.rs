//! One-shot startup clear.
//!
//! The host may restore an "occupied" value persisted by a previous session.
//! Shortly after activation we force unoccupied unless real motion already
//! arrived.

use super::reconciler::OccupancyReconciler;
use crate::clusters::AttributeSink;
use crate::timer::{TimerFired, TimerKind, TimerSlot};
use log::{debug, info, warn};
use tokio::time::Duration;

pub struct StartupReconciler {
    timer: TimerSlot,
    grace: Duration,
}

impl StartupReconciler {
    pub fn new(grace: Duration) -> Self {
        Self {
            timer: TimerSlot::new(TimerKind::StartupClear),
            grace,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn start<S: AttributeSink>(&mut self, reconciler: &OccupancyReconciler<S>) {
        if let Err(e) = self.timer.arm(reconciler.scheduler(), self.grace) {
            warn!("[Startup] Could not schedule startup clear: {}", e);
        }
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// Handle a fired timer. Returns whether it was the startup timer.
    pub fn on_fire<S: AttributeSink>(
        &mut self,
        fired: TimerFired,
        reconciler: &mut OccupancyReconciler<S>,
    ) -> bool {
        if !self.timer.accept(fired) {
            return false;
        }

        if reconciler.state().motion_event_count() == 0 {
            info!("[Startup] No motion since activation, forcing unoccupied");
            reconciler.force_unoccupied();
        } else {
            debug!("[Startup] Motion already received, leaving occupancy alone");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::Timings;
    use crate::occupancy::test_support::{OCCUPIED, RecordingSink, UNOCCUPIED};
    use crate::timer::{Scheduler, TimerReceiver};
    use tokio::time::{Instant, sleep};
    use tokio_util::sync::CancellationToken;

    fn setup() -> (
        OccupancyReconciler<RecordingSink>,
        StartupReconciler,
        TimerReceiver,
    ) {
        let (scheduler, rx) = Scheduler::new(CancellationToken::new());
        let reconciler =
            OccupancyReconciler::new(RecordingSink::default(), scheduler, Timings::default());
        (reconciler, StartupReconciler::new(Duration::from_secs(5)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_forces_clear_without_motion() {
        let (mut r, mut startup, mut rx) = setup();
        let start = Instant::now();
        startup.start(&r);

        let fired = rx.recv().await.unwrap();
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
        assert!(startup.on_fire(fired, &mut r));

        assert_eq!(r.sink().updates(), vec![UNOCCUPIED]);
        assert!(!startup.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_after_motion() {
        let (mut r, mut startup, mut rx) = setup();
        startup.start(&r);
        sleep(Duration::from_secs(1)).await;
        r.motion_event();

        let fired = rx.recv().await.unwrap();
        assert!(startup.on_fire(fired, &mut r));

        assert!(r.is_occupied());
        assert_eq!(r.sink().updates(), vec![OCCUPIED]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_startup_never_fires() {
        let (r, mut startup, mut rx) = setup();
        startup.start(&r);
        startup.cancel();

        sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
