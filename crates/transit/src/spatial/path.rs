//! Encoded route paths.

use geo::LineString;

use crate::models::types::{Result, TransitError};

/// Precision used by the route path feed (five decimal places)
pub const PATH_PRECISION: u32 = 5;

/// Decode an encoded polyline into a point sequence (x = longitude, y = latitude).
pub fn decode_path(encoded: &str, precision: u32) -> Result<LineString> {
    polyline::decode_polyline(encoded, precision)
        .map_err(|e| TransitError::InvalidGeometry(format!("undecodable path: {e}")))
}
