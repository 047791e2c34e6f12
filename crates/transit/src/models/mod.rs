//! Transit data models, types, and traits.

pub mod traits;
pub mod types;

// Re-exports for convenience
pub use traits::TransitProvider;
pub use types::{
    DirectionFlag, LiveSnapshot, LiveVehicle, PlaceDetails, PlaceRef, PoiCategory,
    PointOfInterest, Result, RouteCheckpoint, RouteRecord, StopPriority, StopRecord,
    TransitError,
};
