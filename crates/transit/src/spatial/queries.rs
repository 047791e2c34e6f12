//! Spatial query utilities for distance and direction calculations.
//!
//! Uses the Haversine formula for every distance in the engine, so nearest-stop
//! matching and nearest-checkpoint matching always agree.

use geo::{Bearing, BoundingRect, Distance, Haversine, MultiPoint, Point, Rect};

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    Haversine.distance(p1, p2)
}

/// Initial great-circle bearing from `from` to `to`.
///
/// Degrees clockwise from north, in `[0, 360)`.
pub fn bearing(from: Point, to: Point) -> f64 {
    Haversine.bearing(from, to).rem_euclid(360.0)
}

/// Index and distance (meters) of the point in `points` nearest to `target`.
///
/// Ties resolve to the earliest index.
pub fn nearest_point(target: Point, points: impl IntoIterator<Item = Point>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (index, point) in points.into_iter().enumerate() {
        let distance = haversine_distance(target, point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }

    best
}

/// Bounding box of a set of points, or `None` if the set is empty
pub fn bounding_rect(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
    let points: MultiPoint = points.into_iter().collect();
    points.bounding_rect()
}

/// A coordinate the rendering surface can draw: finite, latitude within ±90
/// and longitude within ±180.
pub fn is_valid_coordinate(point: Point) -> bool {
    point.x().is_finite()
        && point.y().is_finite()
        && (-180.0..=180.0).contains(&point.x())
        && (-90.0..=90.0).contains(&point.y())
}

/// Lower bound, in meters, on the haversine distance from `origin` to any point
/// whose planar distance from it in raw degrees is at least `degrees`.
///
/// East-west degrees shrink by the cosine of the latitude, so the bound uses the
/// highest latitude such a point could sit at.
pub fn min_meters_for_degrees(origin: Point, degrees: f64) -> f64 {
    let highest = (origin.y().abs() + degrees).min(90.0);
    let meters_per_degree = Haversine.distance(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
    // Slack for the gap between the flat approximation and the sphere
    degrees * meters_per_degree * highest.to_radians().cos() * 0.99
}

/// Convert meters to degrees at equator (for bounding box queries)
pub fn meters_to_degrees_approx(meters: f64) -> f64 {
    meters / 111_320.0
}
