//! Motion Occupancy Bridge library.
//!
//! Reconciles the noisy alarm set/clear stream of a PIR motion sensor into a
//! clean occupied/unoccupied signal, and exposes it through an OccupancySensing
//! attribute surface and zigbee2mqtt.

pub mod bus;
pub mod clusters;
pub mod config;
pub mod error;
pub mod input;
pub mod instance_lock;
pub mod occupancy;
pub mod sensors;
pub mod timer;
