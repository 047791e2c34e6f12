//! Plain records exchanged with the host, and their conversions.

use geo::{Coord, LineString, Point, Polygon, Rect};
use palette::Srgba;
use shuttle_core::click::ClickEvent;
use shuttle_core::heading::IconTransform;
use shuttle_core::overlay::{MarkerIcon, OverlayDescriptor, OverlayPatch, OverlayShape, OverlayStyle};
use shuttle_core::selection::{
    FilterKey, FilterSnapshot, RouteSelectionState, SelectionChange, SelectionSource,
};
use shuttle_core::transit::{
    DirectionFlag, LiveVehicle, PlaceDetails, PlaceIdentifier, PlaceRef, PoiCategory, RouteCode,
    StopPriority, VehicleIdentifier,
};

#[derive(Clone, Copy, Debug, PartialEq, uniffi::Record)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Point> for LatLng {
    fn from(point: Point) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

impl From<Coord> for LatLng {
    fn from(coord: Coord) -> Self {
        Point::from(coord).into()
    }
}

impl From<LatLng> for Point {
    fn from(value: LatLng) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

fn path(points: impl IntoIterator<Item = Point>) -> Vec<LatLng> {
    points.into_iter().map(LatLng::from).collect()
}

// ---- viewport and clicks --------------------------------------------------

#[derive(Clone, Copy, Debug, uniffi::Record)]
pub struct ViewportRecord {
    pub zoom_level: u8,
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl From<ViewportRecord> for shuttle_core::Viewport {
    fn from(value: ViewportRecord) -> Self {
        Self {
            zoom_level: value.zoom_level,
            bounds: Rect::new(Point::from(value.south_west), Point::from(value.north_east)),
        }
    }
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct ClickRecord {
    pub position: LatLng,
    /// Point of interest the host hit-tested under the click
    pub place: Option<PlaceRecord>,
}

impl From<ClickRecord> for ClickEvent {
    fn from(value: ClickRecord) -> Self {
        Self {
            position: value.position.into(),
            place: value.place.map(PlaceRef::from),
        }
    }
}

// ---- places ---------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct PlaceRecord {
    pub id: String,
    pub name: Option<String>,
    pub position: LatLng,
}

impl From<PlaceRecord> for PlaceRef {
    fn from(value: PlaceRecord) -> Self {
        Self {
            id: PlaceIdentifier::new(value.id),
            name: value.name.map(Into::into),
            position: value.position.into(),
        }
    }
}

impl From<&PlaceRef> for PlaceRecord {
    fn from(value: &PlaceRef) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name.as_deref().map(str::to_owned),
            position: value.position.into(),
        }
    }
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct PlaceDetailsRecord {
    pub place: PlaceRecord,
    pub address: Option<String>,
    pub category: Option<String>,
}

impl From<PlaceDetailsRecord> for PlaceDetails {
    fn from(value: PlaceDetailsRecord) -> Self {
        Self {
            place: value.place.into(),
            address: value.address.map(Into::into),
            category: value.category.map(Into::into),
        }
    }
}

// ---- live vehicles --------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum TravelDirection {
    Forward,
    Reverse,
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub position: LatLng,
    pub direction: TravelDirection,
    /// Metres per second
    pub speed: f64,
    pub route_code: String,
}

impl From<VehicleRecord> for LiveVehicle {
    fn from(value: VehicleRecord) -> Self {
        Self {
            vehicle_id: VehicleIdentifier::new(value.vehicle_id),
            position: value.position.into(),
            direction: match value.direction {
                TravelDirection::Forward => DirectionFlag::Forward,
                TravelDirection::Reverse => DirectionFlag::Reverse,
            },
            speed: value.speed,
            route_code: RouteCode::new(value.route_code),
        }
    }
}

// ---- reference data -------------------------------------------------------

#[derive(Clone, Copy, Debug, uniffi::Enum)]
pub enum StopImportance {
    Essential,
    Major,
    Minor,
}

impl From<StopImportance> for StopPriority {
    fn from(value: StopImportance) -> Self {
        match value {
            StopImportance::Essential => StopPriority::Essential,
            StopImportance::Major => StopPriority::Major,
            StopImportance::Minor => StopPriority::Minor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum PlaceCategory {
    Landmark,
    Academic,
    Residence,
    Printer,
    Sports,
}

impl From<PlaceCategory> for PoiCategory {
    fn from(value: PlaceCategory) -> Self {
        match value {
            PlaceCategory::Landmark => PoiCategory::Landmark,
            PlaceCategory::Academic => PoiCategory::Academic,
            PlaceCategory::Residence => PoiCategory::Residence,
            PlaceCategory::Printer => PoiCategory::Printer,
            PlaceCategory::Sports => PoiCategory::Sports,
        }
    }
}

impl From<PoiCategory> for PlaceCategory {
    fn from(value: PoiCategory) -> Self {
        match value {
            PoiCategory::Landmark => PlaceCategory::Landmark,
            PoiCategory::Academic => PlaceCategory::Academic,
            PoiCategory::Residence => PlaceCategory::Residence,
            PoiCategory::Printer => PlaceCategory::Printer,
            PoiCategory::Sports => PlaceCategory::Sports,
        }
    }
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct StopInput {
    pub id: String,
    pub name: String,
    pub position: LatLng,
    pub importance: StopImportance,
    pub routes: Vec<String>,
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct PlaceInput {
    pub id: String,
    pub name: String,
    pub category: PlaceCategory,
    pub position: LatLng,
    /// Building outline; empty when unknown
    pub footprint: Vec<LatLng>,
}

impl PlaceInput {
    pub(crate) fn footprint(&self) -> Option<Polygon> {
        if self.footprint.len() < 3 {
            return None;
        }
        let ring: LineString = self.footprint.iter().map(|p| Point::from(*p)).collect();
        Some(Polygon::new(ring, vec![]))
    }
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct CheckpointInput {
    pub sequence: u32,
    pub position: LatLng,
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct RouteInput {
    pub code: String,
    pub name: String,
    /// Hex RGB, e.g. "1E88E5"
    pub color: String,
    pub checkpoints: Vec<CheckpointInput>,
    /// Encoded polyline at precision 5
    pub encoded_path: Option<String>,
}

#[derive(Clone, Debug, Default, uniffi::Record)]
pub struct TransitData {
    pub stops: Vec<StopInput>,
    pub places: Vec<PlaceInput>,
    pub routes: Vec<RouteInput>,
}

#[derive(Clone, Debug, uniffi::Record)]
pub struct NearestStopRecord {
    pub stop_id: String,
    pub name: String,
    pub position: LatLng,
    pub routes: Vec<String>,
}

// ---- overlays -------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum IconKind {
    StopDot,
    Vehicle,
    Place { category: PlaceCategory },
    SearchResult,
    Highlight,
}

impl From<MarkerIcon> for IconKind {
    fn from(value: MarkerIcon) -> Self {
        match value {
            MarkerIcon::StopDot => IconKind::StopDot,
            MarkerIcon::Vehicle => IconKind::Vehicle,
            MarkerIcon::Poi(category) => IconKind::Place {
                category: category.into(),
            },
            MarkerIcon::SearchResult => IconKind::SearchResult,
            MarkerIcon::Highlight => IconKind::Highlight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Enum)]
pub enum ShapeRecord {
    Marker {
        position: LatLng,
        icon: IconKind,
        rotation_deg: f64,
        mirrored: bool,
    },
    Polyline {
        path: Vec<LatLng>,
        width: f32,
    },
    Polygon {
        outline: Vec<LatLng>,
    },
    Label {
        position: LatLng,
        text: String,
        font_size: f32,
    },
}

impl From<&OverlayShape> for ShapeRecord {
    fn from(value: &OverlayShape) -> Self {
        match value {
            OverlayShape::Marker {
                position,
                icon,
                transform: IconTransform { rotation_deg, mirrored },
            } => ShapeRecord::Marker {
                position: (*position).into(),
                icon: (*icon).into(),
                rotation_deg: *rotation_deg,
                mirrored: *mirrored,
            },
            OverlayShape::Polyline { path: line, width } => ShapeRecord::Polyline {
                path: path(line.points()),
                width: *width,
            },
            OverlayShape::Polygon { outline } => ShapeRecord::Polygon {
                outline: path(outline.exterior().points()),
            },
            OverlayShape::Label {
                position,
                text,
                font_size,
            } => ShapeRecord::Label {
                position: (*position).into(),
                text: text.to_string(),
                font_size: *font_size,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, uniffi::Record)]
pub struct StyleRecord {
    /// Packed 0xAARRGGBB
    pub argb: u32,
    pub scale: f32,
}

pub(crate) fn pack_argb(color: Srgba<f32>) -> u32 {
    let c: Srgba<u8> = color.into_format();
    u32::from_be_bytes([c.alpha, c.red, c.green, c.blue])
}

impl From<&OverlayStyle> for StyleRecord {
    fn from(value: &OverlayStyle) -> Self {
        Self {
            argb: pack_argb(value.color),
            scale: value.scale,
        }
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct OverlayRecord {
    pub id: String,
    pub z_index: i32,
    pub shape: ShapeRecord,
    pub style: StyleRecord,
    pub visible: bool,
    pub clickable: bool,
}

impl From<&OverlayDescriptor> for OverlayRecord {
    fn from(value: &OverlayDescriptor) -> Self {
        Self {
            id: value.id.to_string(),
            z_index: value.z_index(),
            shape: (&value.shape).into(),
            style: (&value.style).into(),
            visible: value.visible,
            clickable: value.clickable,
        }
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct OverlayPatchRecord {
    pub shape: Option<ShapeRecord>,
    pub style: Option<StyleRecord>,
    pub visible: Option<bool>,
    pub clickable: Option<bool>,
}

impl From<&OverlayPatch> for OverlayPatchRecord {
    fn from(value: &OverlayPatch) -> Self {
        Self {
            shape: value.shape.as_ref().map(ShapeRecord::from),
            style: value.style.as_ref().map(StyleRecord::from),
            visible: value.visible,
            clickable: value.clickable,
        }
    }
}

// ---- selection ------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum SelectionOrigin {
    FilterPanel,
    NearestStopTab,
}

impl From<SelectionOrigin> for SelectionSource {
    fn from(value: SelectionOrigin) -> Self {
        match value {
            SelectionOrigin::FilterPanel => SelectionSource::FilterPanel,
            SelectionOrigin::NearestStopTab => SelectionSource::NearestStopTab,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum FilterLayer {
    Landmarks,
    Academic,
    Residences,
    BusStops,
}

impl From<FilterLayer> for FilterKey {
    fn from(value: FilterLayer) -> Self {
        match value {
            FilterLayer::Landmarks => FilterKey::Landmarks,
            FilterLayer::Academic => FilterKey::Academic,
            FilterLayer::Residences => FilterKey::Residences,
            FilterLayer::BusStops => FilterKey::BusStops,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Record)]
pub struct FilterState {
    pub landmarks: bool,
    pub academic: bool,
    pub residences: bool,
    pub bus_stops: bool,
}

impl From<FilterSnapshot> for FilterState {
    fn from(value: FilterSnapshot) -> Self {
        Self {
            landmarks: value.landmarks,
            academic: value.academic,
            residences: value.residences,
            bus_stops: value.bus_stops,
        }
    }
}

impl From<FilterState> for FilterSnapshot {
    fn from(value: FilterState) -> Self {
        Self {
            landmarks: value.landmarks,
            academic: value.academic,
            residences: value.residences,
            bus_stops: value.bus_stops,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum RouteSelectionRecord {
    NoRoute,
    ViaFilterPanel { route_code: String },
    ViaNearestStopTab { route_code: String },
}

impl From<RouteSelectionState> for RouteSelectionRecord {
    fn from(value: RouteSelectionState) -> Self {
        match value {
            RouteSelectionState::NoRouteSelected => Self::NoRoute,
            RouteSelectionState::RouteSelectedViaFilter(code) => Self::ViaFilterPanel {
                route_code: code.to_string(),
            },
            RouteSelectionState::RouteSelectedViaTab(code) => Self::ViaNearestStopTab {
                route_code: code.to_string(),
            },
        }
    }
}

/// What the selection UIs should render after an input.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct SelectionRecord {
    pub route: RouteSelectionRecord,
    pub filters: FilterState,
    /// False when the input was an echo or did not change anything
    pub changed: bool,
}

impl SelectionRecord {
    pub(crate) fn new(
        state: RouteSelectionState,
        filters: FilterSnapshot,
        change: &SelectionChange,
    ) -> Self {
        Self {
            route: state.into(),
            filters: filters.into(),
            changed: change.is_change(),
        }
    }
}
