//! The engine context object.
//!
//! `TransitOverlayEngine` owns every piece of mutable map state for one session:
//! the selection machine, the reconciler, the latest live vehicles, the click
//! resolver and the optional live-feed poller. Hosts feed it events and call
//! [`TransitOverlayEngine::flush`] whenever they want the surface to catch up;
//! any number of inputs between two flushes collapse into one reconciliation.

use std::collections::BTreeMap;
use std::sync::Arc;

use geo::{Point, Rect};
use shuttle_transit::{
    LiveDataFeed, LiveSnapshot, LiveVehicle, PlaceLookup, PlaceRef, RouteCode, StopRecord,
    TransitProvider,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::click::{ClickEvent, ClickResolution, ClickResolver, ClickStatus, RequestId};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::live::LiveFeedPoller;
use crate::lod::LodPlan;
use crate::overlay::{OverlayReconciler, ReconcileReport, RenderingSurface};
use crate::scene::{SceneInputs, SearchResults, build_scene};
use crate::selection::{
    FilterKey, FilterSnapshot, RouteSelectionMachine, RouteSelectionState, SelectionChange,
    SelectionSource,
};

/// What the rendering surface currently shows. Owned by the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub zoom_level: u8,
    pub bounds: Rect,
}

pub struct TransitOverlayEngine {
    config: EngineConfig,
    runtime: Handle,
    provider: Arc<dyn TransitProvider>,
    reconciler: OverlayReconciler,
    selection: RouteSelectionMachine,
    clicks: ClickResolver,
    poller: Option<LiveFeedPoller>,
    viewport: Option<Viewport>,
    vehicles: BTreeMap<RouteCode, Vec<LiveVehicle>>,
    selected_place: Option<PlaceRef>,
    search: Option<SearchResults>,
    dirty: bool,
    torn_down: bool,
}

impl TransitOverlayEngine {
    /// Builds an engine drawing on `surface`.
    ///
    /// Click resolutions arrive on the returned receiver and must be handed
    /// back through [`apply_click_resolution`](Self::apply_click_resolution).
    pub fn new(
        config: EngineConfig,
        runtime: Handle,
        provider: Arc<dyn TransitProvider>,
        surface: Box<dyn RenderingSurface>,
        lookup: Arc<dyn PlaceLookup>,
        filters: FilterSnapshot,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClickResolution>)> {
        config.validate()?;

        let (click_tx, click_rx) = mpsc::unbounded_channel();
        let clicks = ClickResolver::new(runtime.clone(), lookup, &config, click_tx);
        let reconciler = OverlayReconciler::new(surface, config.fit_padding_px);

        let engine = Self {
            config,
            runtime,
            provider,
            reconciler,
            selection: RouteSelectionMachine::new(filters),
            clicks,
            poller: None,
            viewport: None,
            vehicles: BTreeMap::new(),
            selected_place: None,
            search: None,
            dirty: true,
            torn_down: false,
        };

        Ok((engine, click_rx))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn TransitProvider> {
        &self.provider
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ---- viewport -------------------------------------------------------

    pub fn on_viewport_change(&mut self, viewport: Viewport) {
        let zoom_changed = self.zoom() != viewport.zoom_level;
        self.viewport = Some(viewport);
        if zoom_changed {
            self.dirty = true;
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn zoom(&self) -> u8 {
        self.viewport
            .map(|v| v.zoom_level)
            .unwrap_or(self.config.initial_zoom)
    }

    pub fn lod(&self) -> LodPlan {
        LodPlan::for_zoom(self.zoom())
    }

    // ---- live data ------------------------------------------------------

    /// Starts polling `feed` for the tracked routes.
    ///
    /// Snapshots arrive on the returned receiver and go back in through
    /// [`on_live_snapshot`](Self::on_live_snapshot). Replaces any earlier poller.
    pub fn attach_live_feed(
        &mut self,
        feed: Arc<dyn LiveDataFeed>,
    ) -> mpsc::UnboundedReceiver<LiveSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.poller = Some(LiveFeedPoller::spawn(
            &self.runtime,
            feed,
            self.config.poll_interval(),
            self.config.lookup_timeout(),
            self.tracked_routes(),
            tx,
        ));
        rx
    }

    /// Routes whose vehicles are shown: the active one, or all of them.
    pub fn tracked_routes(&self) -> Vec<RouteCode> {
        match self.selection.active_route() {
            Some(route) => vec![route.clone()],
            None => self
                .provider
                .all_routes()
                .iter()
                .map(|r| r.code.clone())
                .collect(),
        }
    }

    /// Replaces the vehicles of one route with a fresh tick.
    ///
    /// Returns false when the route is not tracked and the snapshot was ignored.
    pub fn on_live_snapshot(&mut self, snapshot: LiveSnapshot) -> bool {
        if !self.tracked_routes().contains(&snapshot.route_code) {
            debug!(route = %snapshot.route_code, "ignoring snapshot for untracked route");
            return false;
        }

        // Vehicles reported under a different route code belong to that route's feed
        let vehicles: Vec<LiveVehicle> = snapshot
            .vehicles
            .into_iter()
            .filter(|v| v.route_code == snapshot.route_code)
            .collect();

        self.vehicles.insert(snapshot.route_code, vehicles);
        self.dirty = true;
        true
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &LiveVehicle> {
        self.vehicles.values().flatten()
    }

    // ---- route selection ------------------------------------------------

    pub fn select_route(&mut self, source: SelectionSource, route: RouteCode) -> SelectionChange {
        let change = self.selection.select(source, route);
        self.after_selection(&change);
        change
    }

    /// A selection UI reports what it now shows.
    pub fn sync_route_selection(
        &mut self,
        source: SelectionSource,
        reported: Option<RouteCode>,
    ) -> SelectionChange {
        let change = self.selection.sync(source, reported);
        self.after_selection(&change);
        change
    }

    pub fn deselect_route(&mut self, source: SelectionSource) -> SelectionChange {
        let change = self.selection.deselect(source);
        self.after_selection(&change);
        change
    }

    pub fn settle_selection(&mut self) {
        self.selection.settle();
    }

    pub fn set_filter(&mut self, key: FilterKey, value: bool) {
        if self.selection.set_filter(key, value) {
            self.dirty = true;
        }
    }

    pub fn selection_state(&self) -> RouteSelectionState {
        self.selection.state()
    }

    pub fn active_route(&self) -> Option<&RouteCode> {
        self.selection.active_route()
    }

    pub fn filters(&self) -> FilterSnapshot {
        self.selection.filters()
    }

    /// The stop nearest to `point` and the routes serving it, for the
    /// nearest-stop tab.
    pub fn nearest_stop_routes(&self, point: Point) -> Option<(Arc<StopRecord>, Vec<RouteCode>)> {
        let stop = self.provider.nearest_stop(point)?;
        let routes = stop
            .routes
            .iter()
            .filter(|code| self.provider.get_route(code).is_some())
            .cloned()
            .collect();
        Some((stop, routes))
    }

    fn after_selection(&mut self, change: &SelectionChange) {
        if !change.is_change() {
            return;
        }

        let tracked = self.tracked_routes();
        self.vehicles.retain(|route, _| tracked.contains(route));
        if let Some(poller) = &self.poller {
            poller.set_scope(tracked);
        }

        info!(?change, "route selection changed");
        self.dirty = true;
    }

    // ---- clicks and places ----------------------------------------------

    /// Starts resolving a map click. `None` if it duplicated a pending click.
    pub fn on_click(&mut self, click: ClickEvent) -> Option<RequestId> {
        if self.torn_down {
            return None;
        }
        self.clicks.submit(click)
    }

    pub fn pending_click(&self) -> Option<RequestId> {
        self.clicks.pending()
    }

    /// Applies a finished click if it is still the latest one.
    ///
    /// Superseded and cancelled requests come back as [`EngineError::StaleResult`]
    /// and change nothing. A resolved `None` clears the selected place.
    pub fn apply_click_resolution(
        &mut self,
        resolution: ClickResolution,
    ) -> Result<Option<PlaceRef>> {
        if resolution.status != ClickStatus::Resolved || !self.clicks.is_latest(resolution.request_id) {
            return Err(EngineError::StaleResult {
                request_id: resolution.request_id,
                latest: self.clicks.latest(),
            });
        }

        self.select_place(resolution.result.clone());
        Ok(resolution.result)
    }

    pub fn select_place(&mut self, place: Option<PlaceRef>) {
        if self.selected_place != place {
            self.selected_place = place;
            self.dirty = true;
        }
    }

    pub fn selected_place(&self) -> Option<&PlaceRef> {
        self.selected_place.as_ref()
    }

    pub fn set_search_results(&mut self, identity: u64, places: Vec<PlaceRef>) {
        self.search = Some(SearchResults { identity, places });
        self.dirty = true;
    }

    pub fn clear_search_results(&mut self) {
        if self.search.take().is_some() {
            self.dirty = true;
        }
    }

    // ---- rendering ------------------------------------------------------

    /// Rebuilds the scene and reconciles it, if anything changed since the
    /// last flush.
    pub fn flush(&mut self) -> Option<ReconcileReport> {
        if !self.dirty || self.torn_down {
            return None;
        }
        self.dirty = false;

        let vehicles: Vec<LiveVehicle> = self.vehicles.values().flatten().cloned().collect();
        let scene = build_scene(&SceneInputs {
            provider: self.provider.as_ref(),
            lod: self.lod(),
            filters: self.selection.filters(),
            active_route: self.selection.active_route(),
            vehicles: &vehicles,
            selected_place: self.selected_place.as_ref(),
            search: self.search.as_ref(),
        });

        let report = self.reconciler.reconcile(scene);
        debug!(?report, "flushed overlays");
        Some(report)
    }

    pub fn overlay_count(&self) -> usize {
        self.reconciler.len()
    }

    pub fn reconciler(&self) -> &OverlayReconciler {
        &self.reconciler
    }

    /// Ends the session: cancels lookups, stops polling and clears the surface.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.clicks.cancel_all();
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        let removed = self.reconciler.clear();

        self.vehicles.clear();
        self.selected_place = None;
        self.search = None;
        self.dirty = false;

        info!(removed, "engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for TransitOverlayEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::{LineString, coord};
    use shuttle_transit::network::traits::BoxFuture;
    use shuttle_transit::{
        DirectionFlag, PlaceDetails, PlaceIdentifier, RouteCheckpoint, RouteRecord,
        StaticTransitProvider, StopIdentifier, StopPriority, TransitError, VehicleIdentifier,
    };

    use crate::overlay::OverlayId;
    use crate::overlay::surface::recording::{RecordingSurface, SurfaceOp};

    struct FixedLookup(Option<PlaceRef>);

    impl PlaceLookup for FixedLookup {
        fn search_nearby<'a>(
            &'a self,
            _point: Point,
            _radius_m: f64,
        ) -> BoxFuture<'a, shuttle_transit::Result<Option<PlaceRef>>> {
            let place = self.0.clone();
            Box::pin(async move { Ok(place) })
        }

        fn reverse_geocode<'a>(
            &'a self,
            _point: Point,
        ) -> BoxFuture<'a, shuttle_transit::Result<Option<PlaceRef>>> {
            Box::pin(async { Ok(None) })
        }

        fn place_details<'a>(
            &'a self,
            id: &'a PlaceIdentifier,
        ) -> BoxFuture<'a, shuttle_transit::Result<PlaceDetails>> {
            Box::pin(async move { Err(TransitError::LookupFailed(id.to_string())) })
        }
    }

    fn provider() -> Arc<dyn TransitProvider> {
        let stop = |id: &str, lat: f64, routes: &[&str]| StopRecord {
            id: StopIdentifier::new(id),
            name: id.into(),
            position: Point::new(-117.84, lat),
            priority: StopPriority::Major,
            routes: routes.iter().map(|r| RouteCode::new(*r)).collect(),
        };
        let route = |code: &str, lon: f64| {
            RouteRecord::new(
                RouteCode::new(code),
                code,
                "43A047",
                vec![
                    RouteCheckpoint::new(0, Point::new(lon, 33.640)),
                    RouteCheckpoint::new(1, Point::new(lon, 33.650)),
                ],
                LineString::new(vec![]),
            )
        };

        Arc::new(StaticTransitProvider::from_data(
            vec![
                stop("student_center", 33.640, &["A1"]),
                stop("vdc", 33.650, &["A1", "D2"]),
            ],
            vec![],
            vec![route("A1", -117.84), route("D2", -117.83)],
        ))
    }

    fn place(id: &str) -> PlaceRef {
        PlaceRef {
            id: PlaceIdentifier::new(id),
            name: None,
            position: Point::new(-117.842, 33.645),
        }
    }

    fn vehicle(id: &str, route: &str, lat: f64) -> LiveVehicle {
        LiveVehicle {
            vehicle_id: VehicleIdentifier::new(id),
            position: Point::new(-117.84, lat),
            direction: DirectionFlag::Forward,
            speed: 6.0,
            route_code: RouteCode::new(route),
        }
    }

    fn engine(
        lookup: Option<PlaceRef>,
    ) -> (TransitOverlayEngine, RecordingSurface, mpsc::UnboundedReceiver<ClickResolution>) {
        let surface = RecordingSurface::default();
        let (engine, rx) = TransitOverlayEngine::new(
            EngineConfig::default(),
            Handle::current(),
            provider(),
            Box::new(surface.clone()),
            Arc::new(FixedLookup(lookup)),
            FilterSnapshot::FALLBACK,
        )
        .unwrap();
        (engine, surface, rx)
    }

    fn viewport(zoom: u8) -> Viewport {
        Viewport {
            zoom_level: zoom,
            bounds: Rect::new(coord! { x: -117.86, y: 33.63 }, coord! { x: -117.82, y: 33.66 }),
        }
    }

    fn draws(ops: &[SurfaceOp]) -> usize {
        ops.iter().filter(|op| matches!(op, SurfaceOp::Draw(_))).count()
    }

    fn removes(ops: &[SurfaceOp]) -> usize {
        ops.iter().filter(|op| matches!(op, SurfaceOp::Remove(_))).count()
    }

    #[tokio::test]
    async fn zoom_change_only_restyles() {
        let (mut engine, surface, _rx) = engine(None);
        engine.flush().unwrap();
        assert!(draws(&surface.take()) > 0);

        engine.on_viewport_change(viewport(18));
        let report = engine.flush().unwrap();
        let ops = surface.take();

        assert!(report.updated > 0);
        assert_eq!(draws(&ops), 0);
        assert_eq!(removes(&ops), 0);

        // Panning at the same zoom is not an input to the scene
        engine.on_viewport_change(viewport(18));
        assert!(engine.flush().is_none());
    }

    #[tokio::test]
    async fn route_selection_fits_once_and_restores_filters() {
        let (mut engine, surface, _rx) = engine(None);
        engine.flush();
        surface.take();

        engine.select_route(SelectionSource::FilterPanel, RouteCode::new("A1"));
        assert_eq!(engine.filters(), FilterSnapshot::ROUTE_VIEW);
        engine.flush();
        assert_eq!(RecordingSurface::fits(&surface.take()), 1);

        // New vehicles on the same route do not move the camera again
        engine.on_live_snapshot(LiveSnapshot::new(
            RouteCode::new("A1"),
            vec![vehicle("bus-1", "A1", 33.645)],
        ));
        engine.flush();
        assert_eq!(RecordingSurface::fits(&surface.take()), 0);

        engine.select_route(SelectionSource::NearestStopTab, RouteCode::new("D2"));
        engine.flush();
        let ops = surface.take();
        assert_eq!(RecordingSurface::fits(&ops), 1);
        assert!(ops.contains(&SurfaceOp::Remove(OverlayId::vehicle(&VehicleIdentifier::new("bus-1")))));

        engine.deselect_route(SelectionSource::NearestStopTab);
        assert_eq!(engine.filters(), FilterSnapshot::FALLBACK);
        assert_eq!(engine.selection_state(), RouteSelectionState::NoRouteSelected);
        engine.flush();
        assert!(engine.reconciler().get(&OverlayId::route_path(&RouteCode::new("D2"))).is_none());
    }

    #[tokio::test]
    async fn live_snapshots_replace_wholesale() {
        let (mut engine, surface, _rx) = engine(None);

        engine.on_live_snapshot(LiveSnapshot::new(
            RouteCode::new("A1"),
            vec![vehicle("bus-1", "A1", 33.641), vehicle("bus-2", "A1", 33.648)],
        ));
        engine.flush();
        surface.take();

        engine.on_live_snapshot(LiveSnapshot::new(
            RouteCode::new("A1"),
            vec![vehicle("bus-2", "A1", 33.649)],
        ));
        engine.flush();
        let ops = surface.take();

        assert!(ops.contains(&SurfaceOp::Remove(OverlayId::vehicle(&VehicleIdentifier::new("bus-1")))));
        assert!(ops.iter().any(|op| matches!(
            op,
            SurfaceOp::Update(id, _) if *id == OverlayId::vehicle(&VehicleIdentifier::new("bus-2"))
        )));
        assert_eq!(engine.vehicles().count(), 1);
    }

    #[tokio::test]
    async fn untracked_route_snapshots_are_ignored() {
        let (mut engine, _surface, _rx) = engine(None);
        engine.select_route(SelectionSource::FilterPanel, RouteCode::new("A1"));

        assert!(!engine.on_live_snapshot(LiveSnapshot::new(
            RouteCode::new("D2"),
            vec![vehicle("bus-9", "D2", 33.645)],
        )));
        assert_eq!(engine.tracked_routes(), vec![RouteCode::new("A1")]);
        assert_eq!(engine.vehicles().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_click_highlights_place() {
        let (mut engine, surface, mut rx) = engine(Some(place("bookstore")));

        let id = engine.on_click(ClickEvent::at(Point::new(-117.842, 33.645))).unwrap();
        let resolution = rx.recv().await.unwrap();
        assert_eq!(resolution.request_id, id);

        let applied = engine.apply_click_resolution(resolution).unwrap();
        assert_eq!(applied, Some(place("bookstore")));

        engine.flush();
        assert!(surface.take().contains(&SurfaceOp::Draw(OverlayId::highlight())));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_resolution_is_rejected() {
        let (mut engine, _surface, _rx) = engine(None);

        engine.on_click(ClickEvent::at(Point::new(-117.842, 33.645)));
        engine.on_click(ClickEvent::at(Point::new(-117.843, 33.645)));

        let stale = ClickResolution {
            request_id: 1,
            status: ClickStatus::Resolved,
            result: Some(place("old")),
        };
        assert!(matches!(
            engine.apply_click_resolution(stale),
            Err(EngineError::StaleResult { request_id: 1, latest: 2 })
        ));
        assert!(engine.selected_place().is_none());
    }

    #[tokio::test]
    async fn search_results_fit_once_per_identity() {
        let (mut engine, surface, _rx) = engine(None);
        engine.flush();
        surface.take();

        engine.set_search_results(1, vec![place("a"), place("b")]);
        engine.flush();
        assert_eq!(RecordingSurface::fits(&surface.take()), 1);

        engine.set_search_results(1, vec![place("a"), place("b")]);
        engine.flush();
        assert_eq!(RecordingSurface::fits(&surface.take()), 0);

        engine.clear_search_results();
        engine.flush();
        engine.set_search_results(1, vec![place("a")]);
        engine.flush();
        assert_eq!(RecordingSurface::fits(&surface.take()), 1);
    }

    #[tokio::test]
    async fn nearest_stop_offers_its_routes() {
        let (engine, _surface, _rx) = engine(None);

        let (stop, routes) = engine.nearest_stop_routes(Point::new(-117.8401, 33.6499)).unwrap();
        assert_eq!(stop.id, StopIdentifier::new("vdc"));
        assert_eq!(routes, vec![RouteCode::new("A1"), RouteCode::new("D2")]);
    }

    #[tokio::test]
    async fn teardown_clears_surface() {
        let (mut engine, surface, _rx) = engine(None);
        engine.flush();
        let drawn = draws(&surface.take());

        engine.teardown();
        assert_eq!(removes(&surface.take()), drawn);
        assert_eq!(engine.overlay_count(), 0);

        engine.select_place(Some(place("late")));
        assert!(engine.flush().is_none());
        assert!(engine.on_click(ClickEvent::at(Point::new(-117.84, 33.64))).is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = TransitOverlayEngine::new(
            EngineConfig {
                debounce_ms: 0,
                ..EngineConfig::default()
            },
            runtime.handle().clone(),
            provider(),
            Box::new(RecordingSurface::default()),
            Arc::new(FixedLookup(None)),
            FilterSnapshot::FALLBACK,
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
