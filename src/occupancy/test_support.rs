use crate::clusters::{AttributeSink, OccupancySensingAttribute};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Duration;

/// Sink that records every attribute update it receives.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    updates: Arc<Mutex<Vec<(OccupancySensingAttribute, u8)>>>,
}

impl RecordingSink {
    pub(crate) fn updates(&self) -> Vec<(OccupancySensingAttribute, u8)> {
        self.updates.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.updates.lock().len()
    }

    pub(crate) fn last(&self) -> Option<(OccupancySensingAttribute, u8)> {
        self.updates.lock().last().copied()
    }
}

impl AttributeSink for RecordingSink {
    fn attribute_updated(&self, attribute: OccupancySensingAttribute, value: u8) {
        self.updates.lock().push((attribute, value));
    }
}

pub(crate) const OCCUPIED: (OccupancySensingAttribute, u8) =
    (OccupancySensingAttribute::Occupancy, 1);

pub(crate) const UNOCCUPIED: (OccupancySensingAttribute, u8) =
    (OccupancySensingAttribute::Occupancy, 0);

/// Let spawned tasks run without moving the paused clock meaningfully.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
