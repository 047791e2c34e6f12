//! # shuttle-transit
//!
//! Campus transit reference data, live vehicle types and geometry utilities.
//!
//! ## Features
//!
//! - **Reference data**: stops, routes with checkpoint sequences, points of interest
//! - **Spatial queries**: R-tree indexed stop lookup with haversine refinement
//! - **Geometry**: encoded path decoding, haversine distance, great-circle bearing
//! - **Pluggable networking**: implement your own live feed and place lookup
//!
//! ## Example
//!
//! ```
//! use shuttle_transit::prelude::*;
//! use geo::Point;
//!
//! let stop = StopRecord {
//!     id: StopIdentifier::new("student_center"),
//!     name: "Student Center".into(),
//!     position: Point::new(-117.8419, 33.6489),
//!     priority: StopPriority::Essential,
//!     routes: vec![RouteCode::new("A1")],
//! };
//!
//! let provider = StaticTransitProvider::from_data(vec![stop], vec![], vec![]);
//!
//! let nearby = provider.stops_near(Point::new(-117.8421, 33.6490), 50.0);
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod identifiers;
pub mod models;
pub mod network;
pub mod provider;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::{traits::*, types::*};
    pub use crate::network::traits::*;
    pub use crate::provider::static_provider::StaticTransitProvider;
}

pub use prelude::*;
