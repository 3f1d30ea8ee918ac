//! Cluster change notifier for pushing attribute updates out.
//!
//! When a sensor value changes, the outbound publisher waiting on the
//! notifier is woken so the new value leaves the process immediately.

use std::sync::Arc;
use tokio::sync::Notify;

/// Wakes a consumer when a cluster attribute changed.
///
/// Clones share the same wake-up signal. A notification sent while nobody is
/// waiting is stored, so the next `notified()` returns immediately.
///
/// # Usage
/// ```ignore
/// let notifier = ClusterNotifier::new(OCCUPANCY_SENSING_CLUSTER_ID);
/// sensor.set_notifier(notifier.clone());
/// loop {
///     notifier.notified().await;
///     publish(sensor.get());
/// }
/// ```
#[derive(Clone)]
pub struct ClusterNotifier {
    signal: Arc<Notify>,
    cluster_id: u16,
}

impl ClusterNotifier {
    /// Create a new notifier for a specific cluster.
    pub fn new(cluster_id: u16) -> Self {
        Self {
            signal: Arc::new(Notify::new()),
            cluster_id,
        }
    }

    /// Get the cluster ID this notifier is configured for.
    pub fn cluster_id(&self) -> u16 {
        self.cluster_id
    }

    /// Notify that this cluster's data changed. Non-blocking.
    pub fn notify(&self) {
        self.signal.notify_one();
    }

    /// Wait for the next change notification.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }
}
