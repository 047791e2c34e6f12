//! Builds the desired overlay set from the engine's current inputs.
//!
//! This is where LOD, filters and route selection meet. The output only ever
//! depends on the inputs, so the reconciler can diff consecutive scenes.

use std::str::FromStr;

use geo::LineString;
use palette::{Srgb, Srgba, WithAlpha};
use shuttle_transit::{
    LiveVehicle, PlaceRef, PoiCategory, PointOfInterest, RouteCode, RouteRecord, StopPriority,
    StopRecord, TransitProvider,
};
use tracing::warn;

use crate::heading::{HeadingResolver, IconTransform};
use crate::lod::LodPlan;
use crate::overlay::{
    MarkerIcon, OverlayDescriptor, OverlayId, OverlayShape, OverlayStyle, ResultSetId, ZLayer,
};
use crate::selection::FilterSnapshot;

const ROUTE_LINE_WIDTH: f32 = 5.0;

const STOP_COLOR: Srgba<f32> = Srgba::new(0.13, 0.13, 0.13, 1.0);
const LABEL_COLOR: Srgba<f32> = Srgba::new(0.1, 0.1, 0.1, 1.0);
const FALLBACK_ROUTE_COLOR: Srgba<f32> = Srgba::new(0.12, 0.53, 0.9, 1.0);
const FOOTPRINT_COLOR: Srgba<f32> = Srgba::new(0.0, 0.39, 0.64, 0.25);
const SEARCH_COLOR: Srgba<f32> = Srgba::new(0.86, 0.2, 0.18, 1.0);
const HIGHLIGHT_COLOR: Srgba<f32> = Srgba::new(1.0, 0.76, 0.03, 1.0);

/// A batch of search results shown together.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResults {
    /// Caller-chosen identity; a new identity is fitted to once
    pub identity: u64,
    pub places: Vec<PlaceRef>,
}

/// Everything a scene is built from.
pub struct SceneInputs<'a> {
    pub provider: &'a dyn TransitProvider,
    pub lod: LodPlan,
    pub filters: FilterSnapshot,
    pub active_route: Option<&'a RouteCode>,
    /// Latest vehicles of every tracked route
    pub vehicles: &'a [LiveVehicle],
    pub selected_place: Option<&'a PlaceRef>,
    pub search: Option<&'a SearchResults>,
}

pub fn build_scene(inputs: &SceneInputs<'_>) -> Vec<OverlayDescriptor> {
    let mut scene = Vec::new();

    let active = inputs
        .active_route
        .and_then(|code| match inputs.provider.get_route(code) {
            Some(route) => Some(route),
            None => {
                warn!(%code, "active route has no reference data");
                None
            }
        });

    if let Some(route) = &active {
        route_overlays(&mut scene, route);
    }

    let stops = match inputs.active_route {
        Some(code) => inputs.provider.stops_on_route(code),
        None if inputs.filters.bus_stops => inputs.provider.all_stops(),
        None => Vec::new(),
    };
    for stop in &stops {
        // Every stop on the shown route matters as much as the essential ones
        let priority = if inputs.active_route.is_some() {
            StopPriority::Essential
        } else {
            stop.priority
        };
        stop_overlays(&mut scene, stop, priority, &inputs.lod);
    }

    for poi in inputs.provider.points_of_interest() {
        if poi_enabled(poi.category, &inputs.filters) {
            poi_overlays(&mut scene, &poi, &inputs.lod);
        }
    }

    let headings = HeadingResolver::new(inputs.provider);
    for vehicle in inputs.vehicles {
        let heading = headings.resolve_or_neutral(vehicle);
        let color = inputs
            .provider
            .get_route(&vehicle.route_code)
            .map(|route| route_color(&route))
            .unwrap_or(FALLBACK_ROUTE_COLOR);

        scene.push(
            OverlayDescriptor::new(
                OverlayId::vehicle(&vehicle.vehicle_id),
                ZLayer::Vehicle,
                OverlayShape::Marker {
                    position: vehicle.position,
                    icon: MarkerIcon::Vehicle,
                    transform: heading.transform,
                },
                OverlayStyle::new(color),
            )
            .clickable(true),
        );
    }

    if let Some(search) = inputs.search {
        for place in &search.places {
            scene.push(
                OverlayDescriptor::new(
                    OverlayId::search_result(search.identity, &place.id),
                    ZLayer::SearchResult,
                    marker(place.position, MarkerIcon::SearchResult),
                    OverlayStyle::new(SEARCH_COLOR),
                )
                .clickable(true)
                .in_result_set(ResultSetId::SearchResults(search.identity)),
            );
        }
    }

    if let Some(place) = inputs.selected_place {
        scene.push(OverlayDescriptor::new(
            OverlayId::highlight(),
            ZLayer::Highlight,
            marker(place.position, MarkerIcon::Highlight),
            OverlayStyle::new(HIGHLIGHT_COLOR).with_scale(1.25),
        ));
    }

    scene
}

fn route_overlays(scene: &mut Vec<OverlayDescriptor>, route: &RouteRecord) {
    // Without published geometry, connect the checkpoints instead
    let path = if route.path.0.len() >= 2 {
        route.path.clone()
    } else {
        LineString::from_iter(route.checkpoints.iter().map(|c| c.position))
    };

    scene.push(
        OverlayDescriptor::new(
            OverlayId::route_path(&route.code),
            ZLayer::RouteLine,
            OverlayShape::Polyline {
                path,
                width: ROUTE_LINE_WIDTH,
            },
            OverlayStyle::new(route_color(route)),
        )
        .in_result_set(ResultSetId::RoutePath(route.code.clone())),
    );
}

fn stop_overlays(
    scene: &mut Vec<OverlayDescriptor>,
    stop: &StopRecord,
    priority: StopPriority,
    lod: &LodPlan,
) {
    scene.push(
        OverlayDescriptor::new(
            OverlayId::stop_marker(&stop.id),
            ZLayer::StopMarker,
            marker(stop.position, MarkerIcon::StopDot),
            OverlayStyle::new(STOP_COLOR),
        )
        .visible(lod.stop_markers_visible)
        .clickable(lod.stop_markers_visible),
    );

    scene.push(
        OverlayDescriptor::new(
            OverlayId::stop_label(&stop.id),
            ZLayer::StopLabel,
            OverlayShape::Label {
                position: stop.position,
                text: stop.name.clone(),
                font_size: lod.label_font_size,
            },
            OverlayStyle::new(LABEL_COLOR),
        )
        .visible(lod.stop_label_visible(priority)),
    );
}

fn poi_overlays(scene: &mut Vec<OverlayDescriptor>, poi: &PointOfInterest, lod: &LodPlan) {
    if let (PoiCategory::Academic, Some(outline)) = (poi.category, &poi.footprint) {
        scene.push(OverlayDescriptor::new(
            OverlayId::footprint(&poi.id),
            ZLayer::Area,
            OverlayShape::Polygon {
                outline: outline.clone(),
            },
            OverlayStyle::new(FOOTPRINT_COLOR),
        ));
    }

    let scaled = matches!(
        poi.category,
        PoiCategory::Landmark | PoiCategory::Printer | PoiCategory::Sports
    );
    let style = OverlayStyle::new(poi_color(poi.category))
        .with_scale(if scaled { lod.icon_scale } else { 1.0 });

    scene.push(
        OverlayDescriptor::new(
            OverlayId::poi(&poi.id),
            ZLayer::PointOfInterest,
            marker(poi.position, MarkerIcon::Poi(poi.category)),
            style,
        )
        .clickable(true),
    );

    if matches!(poi.category, PoiCategory::Academic | PoiCategory::Residence) {
        scene.push(
            OverlayDescriptor::new(
                OverlayId::poi_label(&poi.id),
                ZLayer::StopLabel,
                OverlayShape::Label {
                    position: poi.position,
                    text: poi.name.clone(),
                    font_size: lod.label_font_size,
                },
                OverlayStyle::new(LABEL_COLOR),
            )
            .visible(lod.hall_labels_visible),
        );
    }
}

fn poi_enabled(category: PoiCategory, filters: &FilterSnapshot) -> bool {
    match category {
        PoiCategory::Landmark | PoiCategory::Printer | PoiCategory::Sports => filters.landmarks,
        PoiCategory::Academic => filters.academic,
        PoiCategory::Residence => filters.residences,
    }
}

fn poi_color(category: PoiCategory) -> Srgba<f32> {
    match category {
        PoiCategory::Landmark => Srgba::new(0.56, 0.27, 0.68, 1.0),
        PoiCategory::Academic => Srgba::new(0.0, 0.39, 0.64, 1.0),
        PoiCategory::Residence => Srgba::new(0.18, 0.55, 0.34, 1.0),
        PoiCategory::Printer => Srgba::new(0.4, 0.4, 0.4, 1.0),
        PoiCategory::Sports => Srgba::new(0.9, 0.49, 0.13, 1.0),
    }
}

fn marker(position: geo::Point, icon: MarkerIcon) -> OverlayShape {
    OverlayShape::Marker {
        position,
        icon,
        transform: IconTransform::NEUTRAL,
    }
}

/// Parses the route's hex colour, falling back to the default blue.
pub fn route_color(route: &RouteRecord) -> Srgba<f32> {
    match Srgb::<u8>::from_str(&route.color) {
        Ok(rgb) => rgb.into_format::<f32>().with_alpha(1.0),
        Err(e) => {
            warn!(route = %route.code, color = %route.color, "unparseable route colour: {e}");
            FALLBACK_ROUTE_COLOR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::{Point, polygon};
    use shuttle_transit::{
        DirectionFlag, PlaceIdentifier, RouteCheckpoint, StaticTransitProvider, StopIdentifier,
        VehicleIdentifier,
    };

    use crate::overlay::OverlayKind;

    fn provider() -> StaticTransitProvider {
        let stop = |id: &str, lat: f64, priority, routes: &[&str]| StopRecord {
            id: StopIdentifier::new(id),
            name: id.into(),
            position: Point::new(-117.84, lat),
            priority,
            routes: routes.iter().map(|r| RouteCode::new(*r)).collect(),
        };

        let stops = vec![
            stop("student_center", 33.640, StopPriority::Essential, &["A1"]),
            stop("arc", 33.642, StopPriority::Minor, &["A1", "D2"]),
            stop("vdc", 33.650, StopPriority::Major, &["D2"]),
        ];

        let pois = vec![
            PointOfInterest {
                id: PlaceIdentifier::new("engineering_hall"),
                name: "Engineering Hall".into(),
                category: PoiCategory::Academic,
                position: Point::new(-117.841, 33.644),
                footprint: Some(polygon![
                    (x: -117.8412, y: 33.6438),
                    (x: -117.8408, y: 33.6438),
                    (x: -117.8408, y: 33.6442),
                    (x: -117.8412, y: 33.6442),
                ]),
            },
            PointOfInterest {
                id: PlaceIdentifier::new("aldrich_park"),
                name: "Aldrich Park".into(),
                category: PoiCategory::Landmark,
                position: Point::new(-117.845, 33.646),
                footprint: None,
            },
        ];

        let routes = vec![RouteRecord::new(
            RouteCode::new("A1"),
            "Anteater Express",
            "1E88E5",
            vec![
                RouteCheckpoint::new(0, Point::new(-117.84, 33.640)),
                RouteCheckpoint::new(1, Point::new(-117.84, 33.642)),
            ],
            LineString::new(vec![]),
        )];

        StaticTransitProvider::from_data(stops, pois, routes)
    }

    fn inputs<'a>(provider: &'a StaticTransitProvider, zoom: u8) -> SceneInputs<'a> {
        SceneInputs {
            provider,
            lod: LodPlan::for_zoom(zoom),
            filters: FilterSnapshot::FALLBACK,
            active_route: None,
            vehicles: &[],
            selected_place: None,
            search: None,
        }
    }

    fn find<'a>(scene: &'a [OverlayDescriptor], id: &OverlayId) -> Option<&'a OverlayDescriptor> {
        scene.iter().find(|d| &d.id == id)
    }

    #[test]
    fn zoom_changes_visibility_not_membership() {
        let provider = provider();
        let far = build_scene(&inputs(&provider, 13));
        let close = build_scene(&inputs(&provider, 18));

        let ids = |scene: &[OverlayDescriptor]| {
            let mut ids: Vec<OverlayId> = scene.iter().map(|d| d.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&far), ids(&close));

        let marker = OverlayId::stop_marker(&StopIdentifier::new("arc"));
        assert!(!find(&far, &marker).unwrap().visible);
        assert!(find(&close, &marker).unwrap().visible);

        let minor_label = OverlayId::stop_label(&StopIdentifier::new("arc"));
        assert!(!find(&far, &minor_label).unwrap().visible);
        let essential_label = OverlayId::stop_label(&StopIdentifier::new("student_center"));
        assert!(find(&far, &essential_label).unwrap().visible);
    }

    #[test]
    fn active_route_shows_its_stops_and_path() {
        let provider = provider();
        let route = RouteCode::new("A1");
        let scene = build_scene(&SceneInputs {
            active_route: Some(&route),
            filters: FilterSnapshot::ROUTE_VIEW,
            ..inputs(&provider, 13)
        });

        let path = find(&scene, &OverlayId::route_path(&route)).unwrap();
        assert_eq!(path.kind(), OverlayKind::Polyline);
        assert_eq!(path.result_set, Some(ResultSetId::RoutePath(route.clone())));
        assert!((path.style.color.blue - 229.0 / 255.0).abs() < 1e-6);

        assert!(find(&scene, &OverlayId::stop_marker(&StopIdentifier::new("vdc"))).is_none());
        // Minor stops on the route are labelled even when far out
        let label = find(&scene, &OverlayId::stop_label(&StopIdentifier::new("arc"))).unwrap();
        assert!(label.visible);

        assert!(find(&scene, &OverlayId::poi(&PlaceIdentifier::new("aldrich_park"))).is_none());
    }

    #[test]
    fn academic_layer_adds_footprints_and_hall_labels() {
        let provider = provider();
        let filters = FilterSnapshot::FALLBACK.with(crate::selection::FilterKey::Academic, true);

        let medium = build_scene(&SceneInputs { filters, ..inputs(&provider, 16) });
        let hall = PlaceIdentifier::new("engineering_hall");
        assert_eq!(
            find(&medium, &OverlayId::footprint(&hall)).unwrap().layer,
            ZLayer::Area
        );
        assert!(!find(&medium, &OverlayId::poi_label(&hall)).unwrap().visible);

        let close = build_scene(&SceneInputs { filters, ..inputs(&provider, 17) });
        assert!(find(&close, &OverlayId::poi_label(&hall)).unwrap().visible);
    }

    #[test]
    fn vehicles_carry_heading_transform() {
        let provider = provider();
        let vehicles = vec![LiveVehicle {
            vehicle_id: VehicleIdentifier::new("bus-7"),
            position: Point::new(-117.84, 33.641),
            direction: DirectionFlag::Reverse,
            speed: 5.0,
            route_code: RouteCode::new("A1"),
        }];
        let scene = build_scene(&SceneInputs {
            vehicles: &vehicles,
            ..inputs(&provider, 16)
        });

        let bus = find(&scene, &OverlayId::vehicle(&VehicleIdentifier::new("bus-7"))).unwrap();
        match &bus.shape {
            OverlayShape::Marker { transform, .. } => {
                assert!(transform.mirrored);
                assert!(transform.rotation_deg < 1.0 || transform.rotation_deg > 359.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn search_and_highlight_layers() {
        let provider = provider();
        let place = PlaceRef {
            id: PlaceIdentifier::new("coffee"),
            name: None,
            position: Point::new(-117.843, 33.645),
        };
        let search = SearchResults {
            identity: 3,
            places: vec![place.clone()],
        };
        let scene = build_scene(&SceneInputs {
            search: Some(&search),
            selected_place: Some(&place),
            ..inputs(&provider, 16)
        });

        let result = find(&scene, &OverlayId::search_result(3, &place.id)).unwrap();
        assert_eq!(result.result_set, Some(ResultSetId::SearchResults(3)));
        assert_eq!(find(&scene, &OverlayId::highlight()).unwrap().layer, ZLayer::Highlight);
    }

    #[test]
    fn bad_route_colour_falls_back() {
        let route = RouteRecord::new(
            RouteCode::new("X"),
            "Broken",
            "not-a-colour",
            vec![],
            LineString::new(vec![]),
        );
        assert_eq!(route_color(&route), FALLBACK_ROUTE_COLOR);
    }
}
