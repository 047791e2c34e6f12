//! Pluggable networking traits.
//!
//! External crates implement these to provide live data and place lookups.
//! Every method suspends; callers bound them with their own timeouts.

use std::future::Future;
use std::pin::Pin;

use geo::Point;

use crate::identifiers::{PlaceIdentifier, RouteCode};
use crate::models::types::{LiveVehicle, PlaceDetails, PlaceRef, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Periodic source of live vehicle positions
pub trait LiveDataFeed: Send + Sync {
    /// Every vehicle currently reporting on a route
    fn fetch_vehicles<'a>(&'a self, route: &'a RouteCode) -> BoxFuture<'a, Result<Vec<LiveVehicle>>>;
}

/// Place search and geocoding service
pub trait PlaceLookup: Send + Sync {
    /// The closest place within `radius_m` of `point`, if any
    fn search_nearby<'a>(
        &'a self,
        point: Point,
        radius_m: f64,
    ) -> BoxFuture<'a, Result<Option<PlaceRef>>>;

    /// The place the coordinate geocodes to, if any
    fn reverse_geocode<'a>(&'a self, point: Point) -> BoxFuture<'a, Result<Option<PlaceRef>>>;

    fn place_details<'a>(&'a self, id: &'a PlaceIdentifier) -> BoxFuture<'a, Result<PlaceDetails>>;
}
