//! Host-facing attribute cache for reconciled sensor values.
//!
//! The occupancy reconciler writes here through the cluster's attribute sink;
//! outbound integrations (MQTT) read the value and wait on the notifier.
//!
//! All sensors implement the [`Sensor`] trait which provides version tracking
//! for change detection. Sensors that push updates also implement
//! [`NotifiableSensor`].

pub mod binary_sensor;
pub mod notifier;
pub mod occupancy_sensor;

pub use binary_sensor::BinarySensor;
pub use notifier::ClusterNotifier;
pub use occupancy_sensor::OccupancySensor;

/// Trait for sensors with change detection.
///
/// The version number is incremented each time the sensor value changes.
pub trait Sensor: Send + Sync {
    /// Get the current version number.
    fn version(&self) -> u32;
}

/// Trait for sensors that wake a consumer when their value changes.
pub trait NotifiableSensor: Sensor {
    /// Set the notifier for this sensor.
    fn set_notifier(&self, notifier: ClusterNotifier);
}
