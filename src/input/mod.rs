//! Input sources feeding the motion event bus.

pub mod ias_zone;
pub mod mqtt;
