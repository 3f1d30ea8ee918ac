//! Cancellable one-shot timers for the occupancy task.
//!
//! Timers never call back into the state machine directly. A fired timer posts
//! a [`TimerFired`] message into the owning task's mailbox, so every transition
//! still runs on that single task. Each purpose owns one [`TimerSlot`]; re-arming
//! a slot cancels the previous timer and bumps its generation, which makes any
//! message the old timer already queued stale.

use crate::error::{BridgeError, Result};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The three timer purposes owned by an occupancy subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TimerKind {
    AutoClear,
    StuckCheck,
    StartupClear,
}

/// Message posted by a timer that reached its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

pub type TimerReceiver = mpsc::UnboundedReceiver<TimerFired>;

/// Schedules timers whose expiry is delivered to a single mailbox.
///
/// All timers spawned by one scheduler share its teardown token: once
/// [`Scheduler::shutdown`] is called, no pending timer will post anything.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler and the receiver its timers post to.
    pub fn new(shutdown: CancellationToken) -> (Self, TimerReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, shutdown }, rx)
    }

    /// Schedule `fired` to be posted after `after` elapses.
    ///
    /// Fails with [`BridgeError::NoScheduler`] when called outside a tokio
    /// runtime and with [`BridgeError::TornDown`] after shutdown.
    pub fn schedule(&self, after: Duration, fired: TimerFired) -> Result<AbortHandle> {
        let runtime = Handle::try_current().map_err(|_| BridgeError::NoScheduler(fired.kind))?;
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::TornDown);
        }

        let deadline = Instant::now() + after;
        let tx = self.tx.clone();
        let shutdown = self.shutdown.clone();
        let task = runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    // Receiver gone means the subsystem is gone too
                    let _ = tx.send(fired);
                }
            }
        });
        Ok(task.abort_handle())
    }

    /// Cancel every timer spawned by this scheduler, now and in the future.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Owned optional timer handle for one purpose.
///
/// Invariant: at most one live timer per slot.
#[derive(Debug)]
pub struct TimerSlot {
    kind: TimerKind,
    generation: u64,
    handle: Option<AbortHandle>,
}

impl TimerSlot {
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            handle: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancel any live timer and arm a new one.
    ///
    /// On failure the slot is left disarmed.
    pub fn arm(&mut self, scheduler: &Scheduler, after: Duration) -> Result<()> {
        self.cancel();
        let fired = TimerFired {
            kind: self.kind,
            generation: self.generation,
        };
        self.handle = Some(scheduler.schedule(after, fired)?);
        Ok(())
    }

    /// Cancel the live timer, if any. A fire already queued becomes stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    /// Accept a fired message if it belongs to this slot's live timer.
    ///
    /// Accepting disarms the slot.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if fired.kind != self.kind || fired.generation != self.generation || self.handle.is_none()
        {
            return false;
        }
        self.handle = None;
        true
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
