//! MQTT input source for zigbee2mqtt device integration.
//!
//! Connects to the broker, feeds the motion sensor's state messages to the
//! IAS zone adapter and publishes the reconciled occupancy back out.

mod client;
mod integration;

pub use client::{MqttClient, MqttMessage};
pub use integration::{MotionSensorIntegration, zone_status_from_payload};
