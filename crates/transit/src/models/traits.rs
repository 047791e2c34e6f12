//! Core traits for transit reference data.
//!
//! Implementations can be in-memory, database-backed, or remote.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;
use crate::models::types::*;

/// Provider of static transit reference data with lookup and query methods
pub trait TransitProvider: Send + Sync {
    // ---- Lookups ----
    fn get_stop(&self, id: &StopIdentifier) -> Option<Arc<StopRecord>>;
    fn get_route(&self, code: &RouteCode) -> Option<Arc<RouteRecord>>;

    /// Checkpoints of a route in sequence order. Empty if the route is unknown
    /// or has no published checkpoints.
    fn checkpoints(&self, code: &RouteCode) -> &[RouteCheckpoint];

    // ---- Collections ----
    fn all_stops(&self) -> Vec<Arc<StopRecord>>;
    fn all_routes(&self) -> Vec<Arc<RouteRecord>>;
    fn points_of_interest(&self) -> Vec<Arc<PointOfInterest>>;

    /// Stops served by the given route
    fn stops_on_route(&self, code: &RouteCode) -> Vec<Arc<StopRecord>>;

    // ---- Spatial queries ----

    /// Find stops within radius (meters), nearest first
    fn stops_near(&self, point: Point, radius_m: f64) -> Vec<Arc<StopRecord>>;

    /// The stop nearest to a point, by haversine distance
    fn nearest_stop(&self, point: Point) -> Option<Arc<StopRecord>>;
}
