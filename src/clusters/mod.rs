//! Host-facing cluster surfaces.

pub mod occupancy_sensing;

pub use occupancy_sensing::{
    AttributeSink, OccupancyCluster, OccupancySensingAttribute, OccupancySensorType,
};
