//! Occupancy sensor attribute cache.

use super::binary_sensor::BinarySensor;

/// Reconciled occupancy as seen by the host.
///
/// Type alias for [`BinarySensor`], backing the OccupancySensing cluster
/// (0x0406) `occupancy` attribute.
pub type OccupancySensor = BinarySensor;
