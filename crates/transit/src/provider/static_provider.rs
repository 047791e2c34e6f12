//! In-memory transit provider.
//!
//! Stores all reference data in memory with a spatial index over stops for
//! fast radius queries.

use std::collections::HashMap;
use std::sync::Arc;

use geo::{LineString, Point};
use rstar::RTree;

use crate::identifiers::*;
use crate::models::{traits::*, types::*};
use crate::spatial::index::StopNode;
use crate::spatial::path::{decode_path, PATH_PRECISION};
use crate::spatial::queries::{haversine_distance, meters_to_degrees_approx, min_meters_for_degrees};

impl RouteRecord {
    /// Build a route, sorting its checkpoints into sequence order.
    pub fn new(
        code: RouteCode,
        name: impl Into<Arc<str>>,
        color: impl Into<Arc<str>>,
        mut checkpoints: Vec<RouteCheckpoint>,
        path: LineString,
    ) -> Self {
        checkpoints.sort_by_key(|c| c.sequence);

        Self {
            code,
            name: name.into(),
            color: color.into(),
            checkpoints,
            path,
        }
    }

    /// Build a route whose path is published as an encoded polyline.
    pub fn with_encoded_path(
        code: RouteCode,
        name: impl Into<Arc<str>>,
        color: impl Into<Arc<str>>,
        checkpoints: Vec<RouteCheckpoint>,
        encoded_path: &str,
    ) -> Result<Self> {
        let path = decode_path(encoded_path, PATH_PRECISION)?;
        Ok(Self::new(code, name, color, checkpoints, path))
    }
}

// ============================================================================
// Static Provider
// ============================================================================

/// In-memory transit provider with spatial indexing
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct StaticTransitProvider {
    // Core data
    stops: Vec<Arc<StopRecord>>,
    routes: Vec<Arc<RouteRecord>>,
    pois: Vec<Arc<PointOfInterest>>,

    // Lookup maps
    stop_map: HashMap<StopIdentifier, Arc<StopRecord>>,
    route_map: HashMap<RouteCode, Arc<RouteRecord>>,

    // Spatial indices
    stop_tree: RTree<StopNode>,
}

impl StaticTransitProvider {
    /// Create a new empty provider
    pub fn new() -> Self {
        Self {
            stops: Vec::new(),
            routes: Vec::new(),
            pois: Vec::new(),
            stop_map: HashMap::new(),
            route_map: HashMap::new(),
            stop_tree: RTree::new(),
        }
    }

    /// Build provider from raw data
    pub fn from_data(
        stops: Vec<StopRecord>,
        pois: Vec<PointOfInterest>,
        routes: Vec<RouteRecord>,
    ) -> Self {
        let stops: Vec<Arc<StopRecord>> = stops.into_iter().map(Arc::new).collect();
        let pois: Vec<Arc<PointOfInterest>> = pois.into_iter().map(Arc::new).collect();
        let mut routes: Vec<Arc<RouteRecord>> = routes.into_iter().map(Arc::new).collect();
        routes.sort_by(|a, b| a.code.cmp(&b.code));

        // Build lookup maps
        let stop_map: HashMap<_, _> = stops
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        let route_map: HashMap<_, _> = routes
            .iter()
            .map(|r| (r.code.clone(), r.clone()))
            .collect();

        // Build spatial index
        let stop_tree = RTree::bulk_load(
            stops
                .iter()
                .map(|s| StopNode::new(s.position, s.clone()))
                .collect(),
        );

        Self {
            stops,
            routes,
            pois,
            stop_map,
            route_map,
            stop_tree,
        }
    }
}

impl Default for StaticTransitProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitProvider for StaticTransitProvider {
    fn get_stop(&self, id: &StopIdentifier) -> Option<Arc<StopRecord>> {
        self.stop_map.get(id).cloned()
    }

    fn get_route(&self, code: &RouteCode) -> Option<Arc<RouteRecord>> {
        self.route_map.get(code).cloned()
    }

    fn checkpoints(&self, code: &RouteCode) -> &[RouteCheckpoint] {
        self.route_map
            .get(code)
            .map(|r| r.checkpoints.as_slice())
            .unwrap_or(&[])
    }

    fn all_stops(&self) -> Vec<Arc<StopRecord>> {
        self.stops.clone()
    }

    fn all_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.routes.clone()
    }

    fn points_of_interest(&self) -> Vec<Arc<PointOfInterest>> {
        self.pois.clone()
    }

    fn stops_on_route(&self, code: &RouteCode) -> Vec<Arc<StopRecord>> {
        self.stops
            .iter()
            .filter(|s| s.is_served_by(code))
            .cloned()
            .collect()
    }

    fn stops_near(&self, point: Point, radius_m: f64) -> Vec<Arc<StopRecord>> {
        // Validate radius is positive
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        // A degree of longitude shrinks with latitude, so widen the envelope accordingly
        let radius_deg =
            meters_to_degrees_approx(radius_m) / point.y().to_radians().cos().abs().max(0.01);

        let mut found: Vec<(f64, Arc<StopRecord>)> = self
            .stop_tree
            .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
            .map(|node| (haversine_distance(point, node.stop.position), node.stop.clone()))
            .filter(|(distance, _)| *distance <= radius_m)
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, stop)| stop).collect()
    }

    fn nearest_stop(&self, point: Point) -> Option<Arc<StopRecord>> {
        let mut best: Option<(f64, &Arc<StopRecord>)> = None;

        // Walk outwards in degree order until no remaining node can beat the best
        // haversine distance seen so far
        for (node, distance_2) in self
            .stop_tree
            .nearest_neighbor_iter_with_distance_2(&[point.x(), point.y()])
        {
            if let Some((best_m, _)) = best {
                if min_meters_for_degrees(point, distance_2.sqrt()) > best_m {
                    break;
                }
            }

            let distance = haversine_distance(point, node.stop.position);
            if best.map_or(true, |(best_m, _)| distance < best_m) {
                best = Some((distance, &node.stop));
            }
        }

        best.map(|(_, stop)| stop.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lon: f64, lat: f64, routes: &[&str]) -> StopRecord {
        StopRecord {
            id: StopIdentifier::new(id),
            name: id.into(),
            position: Point::new(lon, lat),
            priority: StopPriority::Minor,
            routes: routes.iter().map(|r| RouteCode::new(r)).collect(),
        }
    }

    fn provider() -> StaticTransitProvider {
        let route = RouteRecord::new(
            RouteCode::new("A1"),
            "Anteater Express",
            "1E88E5",
            vec![
                RouteCheckpoint::new(2, Point::new(-117.842, 33.646)),
                RouteCheckpoint::new(1, Point::new(-117.841, 33.645)),
            ],
            LineString::from(vec![(-117.841, 33.645), (-117.842, 33.646)]),
        );

        StaticTransitProvider::from_data(
            vec![
                stop("library", -117.8410, 33.6450, &["A1"]),
                stop("arc", -117.8285, 33.6432, &["D2"]),
                stop("plaza", -117.8415, 33.6453, &["A1", "D2"]),
            ],
            vec![],
            vec![route],
        )
    }

    #[test]
    fn test_empty_provider() {
        let provider = StaticTransitProvider::new();
        assert_eq!(provider.all_stops().len(), 0);
        assert_eq!(provider.all_routes().len(), 0);
        assert!(provider.checkpoints(&RouteCode::new("A1")).is_empty());
    }

    #[test]
    fn test_checkpoints_sorted_by_sequence() {
        let provider = provider();
        let checkpoints = provider.checkpoints(&RouteCode::new("A1"));

        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].sequence, 1);
        assert_eq!(checkpoints[1].sequence, 2);
    }

    #[test]
    fn test_stops_near_orders_by_distance() {
        let provider = provider();
        let near = provider.stops_near(Point::new(-117.8411, 33.6450), 100.0);

        let ids: Vec<_> = near.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["library", "plaza"]);

        assert!(provider.stops_near(Point::new(-117.8411, 33.6450), -5.0).is_empty());
    }

    #[test]
    fn test_nearest_stop() {
        let provider = provider();
        let nearest = provider.nearest_stop(Point::new(-117.8290, 33.6430)).unwrap();
        assert_eq!(nearest.id.as_str(), "arc");
    }

    #[test]
    fn test_nearest_stop_uses_ground_distance() {
        // Eight stops ~111 m north crowd the degree-space neighbours, while the
        // stop ~106 m east is closer on the ground
        let origin = Point::new(-117.84, 33.64);
        let mut stops: Vec<StopRecord> = (0..8)
            .map(|i| {
                let offset = (i as f64 - 3.5) * 0.00002;
                stop(&format!("north{i}"), origin.x() + offset, origin.y() + 0.001, &["A1"])
            })
            .collect();
        stops.push(stop("east", origin.x() + 0.00115, origin.y(), &["D2"]));

        let provider = StaticTransitProvider::from_data(stops, vec![], vec![]);
        let nearest = provider.nearest_stop(origin).unwrap();

        assert_eq!(nearest.id.as_str(), "east");
        assert!(
            haversine_distance(origin, nearest.position)
                < haversine_distance(origin, Point::new(origin.x(), origin.y() + 0.001))
        );
    }

    #[test]
    fn test_nearest_stop_empty() {
        assert!(StaticTransitProvider::new().nearest_stop(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_stops_on_route() {
        let provider = provider();
        let mut ids: Vec<_> = provider
            .stops_on_route(&RouteCode::new("D2"))
            .iter()
            .map(|s| s.id.to_string())
            .collect();
        ids.sort();

        assert_eq!(ids, vec!["arc", "plaza"]);
    }
}
