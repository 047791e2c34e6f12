//! Core data types and enums for campus transit data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::{LineString, Point, Polygon};

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// Coarse travel direction reported by the live feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DirectionFlag {
    Forward = 0,
    Reverse = 1,
}

impl DirectionFlag {
    /// Feeds report direction as 0/1; anything else is treated as forward.
    pub fn from_feed(value: u8) -> Self {
        match value {
            1 => Self::Reverse,
            _ => Self::Forward,
        }
    }
}

/// How important a stop is for orientation at low zoom.
///
/// Ordered from most to least important.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopPriority {
    Essential,
    Major,
    Minor,
}

/// Categories of campus points of interest shown as toggleable layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoiCategory {
    Landmark,
    /// Academic halls. Their labels are the "hall" labels.
    Academic,
    Residence,
    Printer,
    Sports,
}

// ============================================================================
// Reference data
// ============================================================================

/// A fixed waypoint along a route, ordered by `sequence`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteCheckpoint {
    pub sequence: u32,
    pub position: Point,
}

impl RouteCheckpoint {
    pub fn new(sequence: u32, position: Point) -> Self {
        Self { sequence, position }
    }
}

#[derive(Clone, Debug)]
pub struct StopRecord {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub position: Point,
    pub priority: StopPriority,
    /// Routes serving this stop
    pub routes: Vec<RouteCode>,
}

impl StopRecord {
    pub fn is_served_by(&self, route: &RouteCode) -> bool {
        self.routes.iter().any(|r| r == route)
    }
}

#[derive(Clone, Debug)]
pub struct PointOfInterest {
    pub id: PlaceIdentifier,
    pub name: Arc<str>,
    pub category: PoiCategory,
    pub position: Point,
    /// Building outline, if known
    pub footprint: Option<Polygon>,
}

#[derive(Clone, Debug)]
pub struct RouteRecord {
    pub code: RouteCode,
    pub name: Arc<str>,
    /// Display colour as hex RGB, e.g. "1E88E5"
    pub color: Arc<str>,
    /// Checkpoints sorted by sequence
    pub checkpoints: Vec<RouteCheckpoint>,
    /// Drawn path. May be empty if the operator publishes no geometry.
    pub path: LineString,
}

// ============================================================================
// Live data
// ============================================================================

/// A vehicle position from a single live-data tick.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveVehicle {
    pub vehicle_id: VehicleIdentifier,
    pub position: Point,
    pub direction: DirectionFlag,
    /// Metres per second
    pub speed: f64,
    pub route_code: RouteCode,
}

/// Every vehicle on one route at one tick. Replaces the previous snapshot wholesale.
#[derive(Clone, Debug)]
pub struct LiveSnapshot {
    pub route_code: RouteCode,
    pub fetched_at: DateTime<Utc>,
    pub vehicles: Vec<LiveVehicle>,
}

impl LiveSnapshot {
    pub fn new(route_code: RouteCode, vehicles: Vec<LiveVehicle>) -> Self {
        Self {
            route_code,
            fetched_at: Utc::now(),
            vehicles,
        }
    }
}

// ============================================================================
// Places
// ============================================================================

/// A reference to a selectable place, as returned by the place lookup service.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceRef {
    pub id: PlaceIdentifier,
    pub name: Option<Arc<str>>,
    pub position: Point,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaceDetails {
    pub place: PlaceRef,
    pub address: Option<Arc<str>>,
    pub category: Option<Arc<str>>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Stop not found: {0}")]
    StopNotFound(StopIdentifier),

    #[error("Route not found: {0}")]
    RouteNotFound(RouteCode),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
