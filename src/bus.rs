//! In-process motion event bus.
//!
//! The hardware adapter and the occupancy reconciler are built independently
//! and wired together afterwards. The bus is the mediator object handed to both:
//! producers call [`EventBus::publish`], consumers hold the receiver returned by
//! [`EventBus::subscribe`]. Each subscriber gets its own FIFO channel, so events
//! are observed in publish order.

use log::trace;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Semantic events carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MotionEvent {
    /// Hardware reported alarm active.
    Motion,
    /// Hardware reported alarm cleared. May not mean what it says.
    MotionClear,
    /// Any frame arrived from the device.
    Communication,
}

impl MotionEvent {
    /// Deliver this event to a listener.
    pub fn dispatch<L: MotionListener + ?Sized>(self, listener: &mut L) {
        match self {
            MotionEvent::Motion => listener.on_motion(),
            MotionEvent::MotionClear => listener.on_motion_clear(),
            MotionEvent::Communication => listener.on_communication(),
        }
    }
}

/// Capability of consuming motion bus events.
pub trait MotionListener {
    fn on_motion(&mut self);

    fn on_motion_clear(&mut self);

    /// Liveness ping. Ignored unless the listener tracks device silence.
    fn on_communication(&mut self) {}
}

pub type BusReceiver = mpsc::UnboundedReceiver<MotionEvent>;

/// Fan-out publish/subscribe channel for [`MotionEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<MotionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> BusReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Publish an event to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned. Returns the number
    /// of subscribers the event reached.
    pub fn publish(&self, event: MotionEvent) -> usize {
        trace!("[Bus] publish {}", event);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
