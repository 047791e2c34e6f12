//! Drawable overlays and the machinery that keeps the surface in sync with them.

pub mod latch;
pub mod reconciler;
pub mod surface;

use std::fmt;
use std::sync::Arc;

use geo::{LineString, Point, Polygon};
use palette::Srgba;
use shuttle_transit::{PlaceIdentifier, PoiCategory, RouteCode, StopIdentifier, VehicleIdentifier};
use shuttle_transit::spatial::is_valid_coordinate;

use crate::error::EngineError;
use crate::heading::IconTransform;

pub use latch::{BoundsFitLatch, FitSlot, ResultSetId};
pub use reconciler::{OverlayReconciler, ReconcileReport};
pub use surface::RenderingSurface;

/// Stable identity of an overlay. The diff key of the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(Arc<str>);

impl OverlayId {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn stop_marker(stop: &StopIdentifier) -> Self {
        Self::new(format!("stop:{stop}"))
    }

    pub fn stop_label(stop: &StopIdentifier) -> Self {
        Self::new(format!("stop-label:{stop}"))
    }

    pub fn route_path(route: &RouteCode) -> Self {
        Self::new(format!("route:{route}"))
    }

    pub fn vehicle(vehicle: &VehicleIdentifier) -> Self {
        Self::new(format!("vehicle:{vehicle}"))
    }

    pub fn poi(place: &PlaceIdentifier) -> Self {
        Self::new(format!("poi:{place}"))
    }

    pub fn poi_label(place: &PlaceIdentifier) -> Self {
        Self::new(format!("poi-label:{place}"))
    }

    pub fn footprint(place: &PlaceIdentifier) -> Self {
        Self::new(format!("footprint:{place}"))
    }

    pub fn search_result(identity: u64, place: &PlaceIdentifier) -> Self {
        Self::new(format!("search:{identity}:{place}"))
    }

    pub fn highlight() -> Self {
        Self::new("highlight")
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overlay families in ascending draw order.
///
/// A higher layer is always drawn above, and wins click hit-testing over, a
/// lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZLayer {
    Area,
    RouteLine,
    StopMarker,
    PointOfInterest,
    StopLabel,
    SearchResult,
    Vehicle,
    Highlight,
}

impl ZLayer {
    pub fn z_index(self) -> i32 {
        self as i32 * 100
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Marker,
    Polyline,
    Polygon,
    Label,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerIcon {
    StopDot,
    Vehicle,
    Poi(PoiCategory),
    SearchResult,
    Highlight,
}

/// Per-kind geometry and content.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayShape {
    Marker {
        position: Point,
        icon: MarkerIcon,
        transform: IconTransform,
    },
    Polyline {
        path: LineString,
        width: f32,
    },
    Polygon {
        outline: Polygon,
    },
    Label {
        position: Point,
        text: Arc<str>,
        font_size: f32,
    },
}

impl OverlayShape {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayShape::Marker { .. } => OverlayKind::Marker,
            OverlayShape::Polyline { .. } => OverlayKind::Polyline,
            OverlayShape::Polygon { .. } => OverlayKind::Polygon,
            OverlayShape::Label { .. } => OverlayKind::Label,
        }
    }

    /// Every coordinate the shape touches
    pub fn points(&self) -> Vec<Point> {
        match self {
            OverlayShape::Marker { position, .. } | OverlayShape::Label { position, .. } => {
                vec![*position]
            }
            OverlayShape::Polyline { path, .. } => path.points().collect(),
            OverlayShape::Polygon { outline } => outline
                .exterior()
                .points()
                .chain(outline.interiors().iter().flat_map(|ring| ring.points()))
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub color: Srgba<f32>,
    pub scale: f32,
}

impl OverlayStyle {
    pub fn new(color: Srgba<f32>) -> Self {
        Self { color, scale: 1.0 }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// One overlay the engine wants on the surface.
///
/// The envelope (`id`, `layer`, `style`, `visible`, `clickable`) is shared by
/// every kind; `shape` carries the kind-specific part.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDescriptor {
    pub id: OverlayId,
    pub layer: ZLayer,
    pub shape: OverlayShape,
    pub style: OverlayStyle,
    pub visible: bool,
    pub clickable: bool,
    /// Logical result set this overlay belongs to, for bounds fitting
    pub result_set: Option<ResultSetId>,
}

impl OverlayDescriptor {
    pub fn new(id: OverlayId, layer: ZLayer, shape: OverlayShape, style: OverlayStyle) -> Self {
        Self {
            id,
            layer,
            shape,
            style,
            visible: true,
            clickable: false,
            result_set: None,
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    pub fn in_result_set(mut self, result_set: ResultSetId) -> Self {
        self.result_set = Some(result_set);
        self
    }

    pub fn kind(&self) -> OverlayKind {
        self.shape.kind()
    }

    pub fn z_index(&self) -> i32 {
        self.layer.z_index()
    }

    /// Checks the geometry can be drawn at all.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| EngineError::InvalidGeometry {
            id: self.id.to_string(),
            reason: reason.to_owned(),
        };

        let points = self.shape.points();
        if points.iter().any(|p| !is_valid_coordinate(*p)) {
            return Err(invalid("non-finite or out-of-range coordinate"));
        }

        match &self.shape {
            OverlayShape::Polyline { path, width } => {
                if path.0.len() < 2 {
                    return Err(invalid("polyline needs at least two points"));
                }
                if !width.is_finite() || *width <= 0.0 {
                    return Err(invalid("polyline width must be positive"));
                }
            }
            // A closed ring repeats its first coordinate
            OverlayShape::Polygon { outline } if outline.exterior().0.len() < 4 => {
                return Err(invalid("polygon needs at least three corners"));
            }
            OverlayShape::Label { font_size, .. } if !font_size.is_finite() => {
                return Err(invalid("label font size must be finite"));
            }
            OverlayShape::Marker { transform, .. } if !transform.rotation_deg.is_finite() => {
                return Err(invalid("marker rotation must be finite"));
            }
            _ => {}
        }

        if !self.style.scale.is_finite() {
            return Err(invalid("style scale must be finite"));
        }

        Ok(())
    }
}

/// Mutable fields of an existing overlay that changed since it was last drawn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayPatch {
    pub shape: Option<OverlayShape>,
    pub style: Option<OverlayStyle>,
    pub visible: Option<bool>,
    pub clickable: Option<bool>,
}

impl OverlayPatch {
    pub fn between(current: &OverlayDescriptor, desired: &OverlayDescriptor) -> Self {
        Self {
            shape: (current.shape != desired.shape).then(|| desired.shape.clone()),
            style: (current.style != desired.style).then_some(desired.style),
            visible: (current.visible != desired.visible).then_some(desired.visible),
            clickable: (current.clickable != desired.clickable).then_some(desired.clickable),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_none() && self.style.is_none() && self.visible.is_none() && self.clickable.is_none()
    }
}
