//! OccupancySensing cluster surface for the reconciled motion sensor.
//!
//! The OccupancySensing cluster (0x0406) is what the host sees. The occupancy
//! attribute is written only by the reconciler through [`AttributeSink`];
//! the sensor-type attributes are constant and never touch reconciliation
//! state.

use crate::error::{BridgeError, Result};
use crate::sensors::OccupancySensor;
use log::debug;
use std::sync::Arc;
use strum::FromRepr;

/// Cluster ID for OccupancySensing
pub const CLUSTER_ID: u16 = 0x0406;

/// Occupancy sensor type enum values
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum OccupancySensorType {
    Pir = 0x00,
    Ultrasonic = 0x01,
    PirAndUltrasonic = 0x02,
    PhysicalContact = 0x03,
}

/// Attribute IDs for the OccupancySensing cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u16)]
pub enum OccupancySensingAttribute {
    /// Bitmap8 where bit 0 indicates sensed occupancy
    Occupancy = 0x0000,
    /// The type of sensor (PIR, Ultrasonic, PhysicalContact, etc.)
    OccupancySensorType = 0x0001,
    /// Bitmap of supported sensor types
    OccupancySensorTypeBitmap = 0x0002,
}

/// Outbound "attribute changed" primitive.
///
/// The reconciler calls this once per rising edge and once per falling edge.
pub trait AttributeSink: Send {
    fn attribute_updated(&self, attribute: OccupancySensingAttribute, value: u8);
}

impl<T: AttributeSink + Sync + ?Sized> AttributeSink for Arc<T> {
    fn attribute_updated(&self, attribute: OccupancySensingAttribute, value: u8) {
        (**self).attribute_updated(attribute, value);
    }
}

/// Read side of the cluster plus the sink that keeps its cache current.
#[derive(Clone)]
pub struct OccupancyCluster {
    sensor: Arc<OccupancySensor>,
}

impl OccupancyCluster {
    pub fn new(sensor: Arc<OccupancySensor>) -> Self {
        Self { sensor }
    }

    /// Generic attribute read.
    pub fn read_attribute(&self, attr_id: u16) -> Result<u8> {
        let attribute = OccupancySensingAttribute::from_repr(attr_id)
            .ok_or(BridgeError::UnsupportedAttribute(attr_id))?;

        let value = match attribute {
            // Bitmap8: bit 0 = sensed occupancy (1 = occupied, 0 = unoccupied)
            OccupancySensingAttribute::Occupancy => u8::from(self.sensor.get()),
            OccupancySensingAttribute::OccupancySensorType => OccupancySensorType::Pir as u8,
            // bit 0 = PIR
            OccupancySensingAttribute::OccupancySensorTypeBitmap => 0x01,
        };
        Ok(value)
    }
}

impl AttributeSink for OccupancyCluster {
    fn attribute_updated(&self, attribute: OccupancySensingAttribute, value: u8) {
        match attribute {
            OccupancySensingAttribute::Occupancy => {
                self.sensor.set(value & 0x01 != 0);
            }
            other => debug!("[Cluster] Ignoring write to constant attribute {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_attributes() {
        let cluster = OccupancyCluster::new(Arc::new(OccupancySensor::new(false)));

        assert_eq!(cluster.read_attribute(0x0001).unwrap(), 0x00);
        assert_eq!(cluster.read_attribute(0x0002).unwrap(), 0x01);
        assert_eq!(
            OccupancySensorType::from_repr(cluster.read_attribute(0x0001).unwrap()),
            Some(OccupancySensorType::Pir)
        );
    }

    #[test]
    fn test_occupancy_follows_sink_updates() {
        let cluster = OccupancyCluster::new(Arc::new(OccupancySensor::new(false)));
        assert_eq!(cluster.read_attribute(0x0000).unwrap(), 0);

        cluster.attribute_updated(OccupancySensingAttribute::Occupancy, 1);
        assert_eq!(cluster.read_attribute(0x0000).unwrap(), 1);

        cluster.attribute_updated(OccupancySensingAttribute::Occupancy, 0);
        assert_eq!(cluster.read_attribute(0x0000).unwrap(), 0);
    }

    #[test]
    fn test_sensor_type_is_not_writable() {
        let cluster = OccupancyCluster::new(Arc::new(OccupancySensor::new(false)));
        cluster.attribute_updated(OccupancySensingAttribute::OccupancySensorType, 3);

        assert_eq!(cluster.read_attribute(0x0001).unwrap(), 0x00);
    }

    #[test]
    fn test_unknown_attribute() {
        let cluster = OccupancyCluster::new(Arc::new(OccupancySensor::new(false)));
        assert!(matches!(
            cluster.read_attribute(0x0010),
            Err(BridgeError::UnsupportedAttribute(0x0010))
        ));
    }
}
