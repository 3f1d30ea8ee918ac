//! IAS Zone notification parsing.
//!
//! Turns a Zone Status Change Notification into bus events: `motion` when
//! alarm 1 is set, `motion_clear` otherwise, and always `communication`
//! because any frame proves the device is alive. Tamper and battery flags are
//! logged and otherwise ignored.
//!
//! There is no error path. A missing or short payload reads as zone status 0,
//! i.e. a clear.

use crate::bus::{EventBus, MotionEvent};
use log::{debug, info, warn};
use std::sync::Arc;

/// ZCL command ID of the Zone Status Change Notification
pub const ZONE_STATUS_CHANGE_NOTIFICATION: u8 = 0x00;

/// Frame control bit: manufacturer-specific frame (manufacturer code follows)
const FRAME_CONTROL_MANUFACTURER_SPECIFIC: u8 = 0x04;

/// IAS Zone status bitmap.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ZoneStatus(u16);

impl ZoneStatus {
    pub const ALARM1: u16 = 0x0001;
    pub const ALARM2: u16 = 0x0002;
    pub const TAMPER: u16 = 0x0004;
    pub const BATTERY: u16 = 0x0008;

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    /// Motion detected.
    pub fn alarm1(self) -> bool {
        self.0 & Self::ALARM1 != 0
    }

    pub fn alarm2(self) -> bool {
        self.0 & Self::ALARM2 != 0
    }

    pub fn tamper(self) -> bool {
        self.0 & Self::TAMPER != 0
    }

    pub fn battery_low(self) -> bool {
        self.0 & Self::BATTERY != 0
    }

    /// Decode the zone status from a notification payload.
    ///
    /// Two or more bytes: little-endian u16. One byte: the single-byte mask.
    /// Empty: 0.
    pub fn from_payload(payload: &[u8]) -> Self {
        match payload {
            [lo, hi, ..] => Self(u16::from_le_bytes([*lo, *hi])),
            [lo] => Self(u16::from(*lo)),
            [] => Self(0),
        }
    }
}

/// A decoded Zone Status Change Notification.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ZoneStatusNotification {
    pub status: ZoneStatus,
    pub extended_status: u8,
    pub zone_id: u8,
    /// Delay reported by the device, in quarter seconds
    pub delay: u16,
}

impl ZoneStatusNotification {
    /// Decode the command payload. Missing trailing fields read as 0.
    pub fn from_payload(payload: &[u8]) -> Self {
        let byte = |i: usize| payload.get(i).copied().unwrap_or(0);
        Self {
            status: ZoneStatus::from_payload(payload),
            extended_status: byte(2),
            zone_id: byte(3),
            delay: u16::from_le_bytes([byte(4), byte(5)]),
        }
    }
}

/// Parse a complete ZCL frame.
///
/// Returns `None` when the frame carries a command other than the zone status
/// change notification. A frame too short to hold a header is read as a
/// notification with an empty payload.
pub fn parse_frame(frame: &[u8]) -> Option<ZoneStatusNotification> {
    let Some(&frame_control) = frame.first() else {
        return Some(ZoneStatusNotification::default());
    };
    let header_len = if frame_control & FRAME_CONTROL_MANUFACTURER_SPECIFIC != 0 {
        5
    } else {
        3
    };
    if frame.len() < header_len {
        return Some(ZoneStatusNotification::default());
    }

    let command_id = frame[header_len - 1];
    if command_id != ZONE_STATUS_CHANGE_NOTIFICATION {
        return None;
    }
    Some(ZoneStatusNotification::from_payload(&frame[header_len..]))
}

/// Publishes bus events for incoming IAS Zone notifications.
pub struct HardwareEventAdapter {
    bus: Arc<EventBus>,
}

impl HardwareEventAdapter {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Handle a decoded zone status. Returns the motion event published.
    pub fn handle_zone_status(&self, status: ZoneStatus) -> MotionEvent {
        let alarm1 = status.alarm1();
        debug!(
            "[IAS] Zone status: 0x{:04X} (motion={})",
            status.bits(),
            alarm1
        );
        if status.tamper() {
            warn!("[IAS] Tamper flag set (zone status 0x{:04X})", status.bits());
        }
        if status.battery_low() {
            warn!("[IAS] Battery low (zone status 0x{:04X})", status.bits());
        }

        let event = if alarm1 {
            MotionEvent::Motion
        } else {
            MotionEvent::MotionClear
        };
        self.bus.publish(event);
        self.bus.publish(MotionEvent::Communication);
        event
    }

    /// Handle a raw ZCL frame from the IAS Zone cluster.
    ///
    /// Frames carrying other commands only count as communication.
    pub fn handle_frame(&self, frame: &[u8]) -> Option<MotionEvent> {
        match parse_frame(frame) {
            Some(notification) => Some(self.handle_zone_status(notification.status)),
            None => {
                info!("[IAS] Ignoring non-notification frame ({} bytes)", frame.len());
                self.bus.publish(MotionEvent::Communication);
                None
            }
        }
    }

    /// Note that the device was heard from without a zone status.
    pub fn handle_communication(&self) {
        self.bus.publish(MotionEvent::Communication);
    }
}
