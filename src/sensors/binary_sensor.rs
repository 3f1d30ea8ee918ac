//! Generic binary sensor state shared with outbound integrations.
//!
//! Written by the occupancy task, read by whoever publishes the value. When
//! the value changes the configured notifier is woken so the update is pushed
//! out right away.

use super::{ClusterNotifier, NotifiableSensor, Sensor};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Thread-safe binary sensor state.
///
/// Implements the [`Sensor`] trait for change detection - the version
/// is incremented each time the value changes via `set()`.
pub struct BinarySensor {
    state: AtomicBool,
    version: AtomicU32,
    notifier: RwLock<Option<ClusterNotifier>>,
}

impl BinarySensor {
    /// Create a new binary sensor with the given initial state.
    pub fn new(initial: bool) -> Self {
        Self {
            state: AtomicBool::new(initial),
            version: AtomicU32::new(0),
            notifier: RwLock::new(None),
        }
    }

    /// Get the current sensor state.
    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Set the sensor state. Increments version if value changed.
    ///
    /// If a notifier is configured, wakes it on change. Returns whether the
    /// value changed.
    pub fn set(&self, value: bool) -> bool {
        let old = self.state.swap(value, Ordering::SeqCst);
        if old == value {
            return false;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify();
        }
        true
    }
}

impl NotifiableSensor for BinarySensor {
    fn set_notifier(&self, notifier: ClusterNotifier) {
        *self.notifier.write() = Some(notifier);
    }
}

impl Sensor for BinarySensor {
    fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}
