//! Which way a vehicle marker should point.
//!
//! Fine heading comes from the route topology: the bearing from the vehicle
//! towards the checkpoint after the one it is nearest to. The feed's coarse
//! direction flag is applied separately as a horizontal mirror, so a reversing
//! shuttle keeps its silhouette instead of turning upside down.

use shuttle_transit::spatial::{bearing, haversine_distance, nearest_point};
use shuttle_transit::{DirectionFlag, LiveVehicle, RouteCheckpoint, TransitProvider};
use tracing::debug;

use crate::error::EngineError;

/// Below this distance (meters) two positions are treated as the same point.
const COINCIDENT_M: f64 = 0.5;

/// How the host should transform the vehicle icon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IconTransform {
    /// Clockwise rotation from north, in degrees
    pub rotation_deg: f64,
    /// Horizontal flip, applied independently of the rotation
    pub mirrored: bool,
}

impl IconTransform {
    pub const NEUTRAL: IconTransform = IconTransform {
        rotation_deg: 0.0,
        mirrored: false,
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleHeading {
    /// Checkpoint the vehicle is nearest to
    pub nearest: Option<RouteCheckpoint>,
    /// Checkpoint the bearing points at
    pub target: Option<RouteCheckpoint>,
    /// `None` when there was nothing to point at
    pub bearing_deg: Option<f64>,
    pub transform: IconTransform,
}

impl VehicleHeading {
    fn neutral(direction: DirectionFlag) -> Self {
        Self {
            nearest: None,
            target: None,
            bearing_deg: None,
            transform: IconTransform {
                mirrored: direction == DirectionFlag::Reverse,
                ..IconTransform::NEUTRAL
            },
        }
    }
}

/// Resolve the heading of `vehicle` from its route's checkpoints.
///
/// `checkpoints` may arrive in any order; they are matched in sequence order.
pub fn resolve_heading(vehicle: &LiveVehicle, checkpoints: &[RouteCheckpoint]) -> VehicleHeading {
    let mut ordered = checkpoints.to_vec();
    if !ordered.is_sorted_by_key(|c| c.sequence) {
        ordered.sort_by_key(|c| c.sequence);
    }

    let Some((index, _)) = nearest_point(vehicle.position, ordered.iter().map(|c| c.position))
    else {
        return VehicleHeading::neutral(vehicle.direction);
    };

    let nearest = ordered[index];
    // Past the end of the route: look at the nearest checkpoint itself
    let target = ordered.get(index + 1).copied().unwrap_or(nearest);

    let bearing_deg = if haversine_distance(vehicle.position, target.position) > COINCIDENT_M {
        Some(bearing(vehicle.position, target.position))
    } else {
        // Sitting on the target, so use the direction of the segment leading into it
        segment_bearing(&ordered, &target)
    };

    VehicleHeading {
        nearest: Some(nearest),
        target: Some(target),
        bearing_deg,
        transform: IconTransform {
            rotation_deg: bearing_deg.unwrap_or(0.0),
            mirrored: vehicle.direction == DirectionFlag::Reverse,
        },
    }
}

fn segment_bearing(ordered: &[RouteCheckpoint], target: &RouteCheckpoint) -> Option<f64> {
    let position = ordered.iter().position(|c| c.sequence == target.sequence)?;
    let previous = ordered[..position]
        .iter()
        .rev()
        .find(|c| haversine_distance(c.position, target.position) > COINCIDENT_M)?;

    Some(bearing(previous.position, target.position))
}

/// Heading resolution against a provider's reference data.
pub struct HeadingResolver<'a> {
    provider: &'a dyn TransitProvider,
}

impl<'a> HeadingResolver<'a> {
    pub fn new(provider: &'a dyn TransitProvider) -> Self {
        Self { provider }
    }

    /// Like [`resolve_heading`], but reports routes without checkpoints.
    ///
    /// The neutral heading is still usable; the error only says why it is neutral.
    pub fn resolve(&self, vehicle: &LiveVehicle) -> Result<VehicleHeading, (VehicleHeading, EngineError)> {
        let checkpoints = self.provider.checkpoints(&vehicle.route_code);
        if checkpoints.is_empty() {
            debug!(route = %vehicle.route_code, vehicle = %vehicle.vehicle_id, "no checkpoints, neutral heading");
            return Err((
                VehicleHeading::neutral(vehicle.direction),
                EngineError::MissingRouteData(vehicle.route_code.clone()),
            ));
        }

        Ok(resolve_heading(vehicle, checkpoints))
    }

    /// Always produces a heading, falling back to neutral
    pub fn resolve_or_neutral(&self, vehicle: &LiveVehicle) -> VehicleHeading {
        self.resolve(vehicle).unwrap_or_else(|(heading, _)| heading)
    }
}
