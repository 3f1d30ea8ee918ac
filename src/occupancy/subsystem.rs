//! The single task that owns one sensor's occupancy state.
//!
//! Bus events and timer expiries are serialized through one `select!` loop, so
//! the reconciler, the stuck-state monitor and the startup reconciler never run
//! concurrently and the state needs no lock. Teardown is checked first on every
//! iteration; once it begins nothing else is dispatched. Queued bus events go
//! before queued timer fires: a motion that arrived before a deadline re-arms
//! the timer, and the fire already in the mailbox is then stale.

use super::Timings;
use super::monitor::StuckStateMonitor;
use super::reconciler::OccupancyReconciler;
use super::startup::StartupReconciler;
use super::state::OccupancySnapshot;
use crate::bus::{BusReceiver, EventBus};
use crate::clusters::AttributeSink;
use crate::error::Result;
use crate::timer::{Scheduler, TimerFired, TimerKind, TimerReceiver};
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct OccupancySubsystem<S: AttributeSink> {
    reconciler: OccupancyReconciler<S>,
    monitor: StuckStateMonitor,
    startup: StartupReconciler,
    events: BusReceiver,
    timers: TimerReceiver,
    shutdown: CancellationToken,
}

impl<S: AttributeSink + 'static> OccupancySubsystem<S> {
    /// Subscribe to `bus` and arm the stuck-check and startup timers.
    ///
    /// Outside a tokio runtime the timers cannot be armed; that is logged and
    /// the subsystem still reconciles events once it runs.
    pub fn activate(bus: &EventBus, sink: S, timings: Timings) -> Self {
        let shutdown = CancellationToken::new();
        let (scheduler, timers) = Scheduler::new(shutdown.child_token());
        let reconciler = OccupancyReconciler::new(sink, scheduler, timings);

        let mut monitor = StuckStateMonitor::new(timings);
        monitor.start(&reconciler);
        let mut startup = StartupReconciler::new(timings.startup_grace);
        startup.start(&reconciler);

        info!(
            "[Occupancy] Activated (timeout {}s, stuck threshold {}s)",
            timings.motion_timeout.as_secs(),
            timings.stuck_motion_threshold.as_secs()
        );

        Self {
            reconciler,
            monitor,
            startup,
            events: bus.subscribe(),
            timers,
            shutdown,
        }
    }

    pub fn reconciler(&self) -> &OccupancyReconciler<S> {
        &self.reconciler
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn start(self) -> SubsystemHandle {
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(self.run());
        SubsystemHandle { shutdown, task }
    }

    /// Process events and timers until teardown or until the bus is dropped.
    pub async fn run(mut self) -> OccupancySnapshot {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => {
                        debug!("[Occupancy] Event: {}", event);
                        event.dispatch(&mut self.reconciler);
                    }
                    None => {
                        info!("[Occupancy] Event bus closed");
                        break;
                    }
                },
                Some(fired) = self.timers.recv() => self.handle_timer(fired),
            }
        }

        self.teardown();
        let snapshot = self.reconciler.state().snapshot(Instant::now());
        info!("[Occupancy] Stopped");
        snapshot
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        let handled = match fired.kind {
            TimerKind::AutoClear => self.reconciler.handle_timer(fired),
            TimerKind::StuckCheck => self.monitor.on_tick(fired, &mut self.reconciler),
            TimerKind::StartupClear => self.startup.on_fire(fired, &mut self.reconciler),
        };
        if !handled {
            debug!("[Occupancy] Dropping stale {} timer", fired.kind);
        }
    }
}

impl<S: AttributeSink> OccupancySubsystem<S> {
    /// Cancel every timer and stop dispatching.
    pub fn teardown(&mut self) {
        self.shutdown.cancel();
        self.reconciler.cancel_timers();
        self.monitor.cancel();
        self.startup.cancel();
    }
}

impl<S: AttributeSink> Drop for OccupancySubsystem<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle to a running subsystem task.
pub struct SubsystemHandle {
    shutdown: CancellationToken,
    task: JoinHandle<OccupancySnapshot>,
}

impl SubsystemHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tear down and wait for the task. Returns its final diagnostics.
    pub async fn shutdown(self) -> Result<OccupancySnapshot> {
        self.shutdown.cancel();
        Ok(self.task.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MotionEvent;
    use crate::input::ias_zone::HardwareEventAdapter;
    use crate::occupancy::test_support::{OCCUPIED, RecordingSink, UNOCCUPIED, settle};
    use std::sync::Arc;
    use tokio::time::{Duration, sleep};

    // ZCL IAS Zone Status Change Notification frames
    const MOTION_FRAME: [u8; 9] = [0x09, 0x21, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
    const CLEAR_FRAME: [u8; 9] = [0x09, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    fn start() -> (Arc<EventBus>, RecordingSink, SubsystemHandle) {
        let bus = Arc::new(EventBus::new());
        let sink = RecordingSink::default();
        let handle = OccupancySubsystem::activate(&bus, sink.clone(), Timings::default()).start();
        (bus, sink, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_drive_occupancy() {
        let (bus, sink, handle) = start();
        let adapter = HardwareEventAdapter::new(bus.clone());

        adapter.handle_frame(&MOTION_FRAME);
        settle().await;
        assert_eq!(sink.updates(), vec![OCCUPIED]);

        sleep(Duration::from_secs(121)).await;
        assert_eq!(sink.updates(), vec![OCCUPIED, UNOCCUPIED]);

        let snapshot = handle.shutdown().await.unwrap();
        assert_eq!(snapshot.motion_event_count, 1);
        assert_eq!(snapshot.communication_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_motion_emits_once_per_rising_edge() {
        let (bus, sink, handle) = start();

        for _ in 0..10 {
            bus.publish(MotionEvent::Motion);
            sleep(Duration::from_secs(30)).await;
        }
        assert_eq!(sink.updates(), vec![OCCUPIED]);

        sleep(Duration::from_secs(120)).await;
        bus.publish(MotionEvent::Motion);
        settle().await;
        assert_eq!(sink.updates(), vec![OCCUPIED, UNOCCUPIED, OCCUPIED]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_for_exactly_the_timeout() {
        let (bus, sink, handle) = start();

        bus.publish(MotionEvent::Motion);
        sleep(Duration::from_millis(119_999)).await;
        assert_eq!(sink.last(), Some(OCCUPIED));

        sleep(Duration::from_millis(2)).await;
        assert_eq!(sink.last(), Some(UNOCCUPIED));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_queued_before_deadline_wins_over_auto_clear() {
        let bus = Arc::new(EventBus::new());
        let sink = RecordingSink::default();
        let mut subsystem = OccupancySubsystem::activate(&bus, sink.clone(), Timings::default());

        subsystem.reconciler.motion_event();
        sleep(Duration::from_millis(119_999)).await;
        bus.publish(MotionEvent::Motion);
        // The auto-clear fire lands in the mailbox behind the motion
        sleep(Duration::from_millis(2)).await;

        let handle = subsystem.start();
        settle().await;
        assert_eq!(sink.updates(), vec![OCCUPIED]);

        let snapshot = handle.shutdown().await.unwrap();
        assert!(snapshot.occupied);
        assert_eq!(snapshot.motion_event_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_clear_reasserts_occupancy() {
        let (bus, sink, handle) = start();
        let adapter = HardwareEventAdapter::new(bus.clone());

        adapter.handle_frame(&MOTION_FRAME);
        sleep(Duration::from_secs(31)).await;
        adapter.handle_frame(&CLEAR_FRAME);
        settle().await;
        assert_eq!(sink.updates(), vec![OCCUPIED, OCCUPIED]);

        // Window restarted at the clear
        sleep(Duration::from_secs(100)).await;
        assert_eq!(sink.len(), 2);
        sleep(Duration::from_secs(21)).await;
        assert_eq!(sink.last(), Some(UNOCCUPIED));

        let snapshot = handle.shutdown().await.unwrap();
        assert_eq!(snapshot.motion_event_count, 2);
        assert_eq!(snapshot.clear_event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_while_unoccupied_is_motion() {
        let (bus, sink, handle) = start();
        // Let the startup clear happen first
        sleep(Duration::from_secs(6)).await;
        assert_eq!(sink.updates(), vec![UNOCCUPIED]);

        bus.publish(MotionEvent::MotionClear);
        settle().await;
        assert_eq!(sink.updates(), vec![UNOCCUPIED, OCCUPIED]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_clear_without_motion() {
        let (_bus, sink, handle) = start();

        sleep(Duration::from_secs(4)).await;
        assert_eq!(sink.len(), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.updates(), vec![UNOCCUPIED]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timer_fires_after_teardown() {
        let (bus, sink, handle) = start();

        bus.publish(MotionEvent::Motion);
        settle().await;
        assert_eq!(sink.len(), 1);

        handle.shutdown().await.unwrap();
        bus.publish(MotionEvent::MotionClear);
        sleep(Duration::from_secs(7200)).await;

        assert_eq!(sink.updates(), vec![OCCUPIED]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_before_startup_grace() {
        let (_bus, sink, handle) = start();

        handle.shutdown().await.unwrap();
        sleep(Duration::from_secs(60)).await;

        assert_eq!(sink.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_silence() {
        let (_bus, _sink, handle) = start();

        sleep(Duration::from_secs(4000)).await;

        let snapshot = handle.shutdown().await.unwrap();
        assert_eq!(snapshot.stuck_warning_count, 1);
        assert!(!snapshot.occupied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_bus_stops_subsystem() {
        let (bus, _sink, handle) = start();

        drop(bus);
        settle().await;

        assert!(!handle.is_running());
    }
}
