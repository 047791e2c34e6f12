use std::sync::{Arc, Mutex, MutexGuard};

use eyre::WrapErr;
use geo::LineString;
use shuttle_core::click::ClickResolution;
use shuttle_core::config::EngineConfig;
use shuttle_core::selection::{FilterSnapshot, SelectionChange};
use shuttle_core::transit::{
    LiveSnapshot, PlaceIdentifier, PointOfInterest, RouteCheckpoint, RouteCode, RouteRecord,
    StaticTransitProvider, StopIdentifier, StopRecord,
};
use shuttle_core::{EngineError, TransitOverlayEngine};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::callbacks::{
    FeedBridge, MapSurface, PlaceBridge, PlaceService, SelectionObserver, SurfaceBridge,
    VehicleFeed,
};
use crate::error::SessionError;
use crate::logging::setup_logging;
use crate::records::{
    ClickRecord, FilterLayer, FilterState, LatLng, NearestStopRecord, PlaceDetailsRecord,
    PlaceRecord, SelectionOrigin, SelectionRecord, TransitData, ViewportRecord,
};

type SharedEngine = Arc<Mutex<TransitOverlayEngine>>;

/// One map screen: engine, runtime and host callbacks.
#[derive(uniffi::Object)]
pub struct MapSession {
    runtime: Option<Runtime>,
    engine: SharedEngine,
    places: Arc<dyn PlaceService>,
    observer: Arc<dyn SelectionObserver>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

#[uniffi::export]
impl MapSession {
    /// `config_json` overrides any subset of the engine defaults.
    #[uniffi::constructor]
    pub fn new(
        data: TransitData,
        surface: Arc<dyn MapSurface>,
        places: Arc<dyn PlaceService>,
        feed: Option<Arc<dyn VehicleFeed>>,
        observer: Arc<dyn SelectionObserver>,
        config_json: Option<String>,
        filters: FilterState,
    ) -> Result<Self, SessionError> {
        setup_logging();

        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json)?,
            None => EngineConfig::default(),
        };
        let provider = build_provider(data).map_err(|e| SessionError::InvalidData {
            reason: format!("{e:#}"),
        })?;
        let runtime = build_runtime().map_err(|e| SessionError::Runtime {
            reason: format!("{e:#}"),
        })?;

        let (mut engine, clicks) = TransitOverlayEngine::new(
            config,
            runtime.handle().clone(),
            Arc::new(provider),
            Box::new(SurfaceBridge(surface)),
            Arc::new(PlaceBridge(Arc::clone(&places))),
            FilterSnapshot::from(filters),
        )?;
        let snapshots = feed.map(|feed| engine.attach_live_feed(Arc::new(FeedBridge(feed))));
        engine.flush();

        let engine = Arc::new(Mutex::new(engine));
        let driver = runtime.spawn(drive(
            Arc::clone(&engine),
            Arc::clone(&observer),
            clicks,
            snapshots,
        ));

        info!("map session started");
        Ok(Self {
            runtime: Some(runtime),
            engine,
            places,
            observer,
            driver: Mutex::new(Some(driver)),
        })
    }

    pub fn on_viewport_change(&self, viewport: ViewportRecord) -> Result<(), SessionError> {
        let mut engine = self.engine()?;
        engine.on_viewport_change(viewport.into());
        engine.flush();
        Ok(())
    }

    /// Returns the click's request id, or `None` for a duplicate.
    pub fn on_map_click(&self, click: ClickRecord) -> Result<Option<u64>, SessionError> {
        Ok(self.engine()?.on_click(click.into()))
    }

    pub fn select_route(
        &self,
        origin: SelectionOrigin,
        route_code: String,
    ) -> Result<SelectionRecord, SessionError> {
        self.with_selection(|engine| engine.select_route(origin.into(), RouteCode::new(route_code)))
    }

    /// A selection UI reports the route it now shows.
    pub fn sync_route_selection(
        &self,
        origin: SelectionOrigin,
        route_code: Option<String>,
    ) -> Result<SelectionRecord, SessionError> {
        self.with_selection(|engine| {
            engine.sync_route_selection(origin.into(), route_code.map(RouteCode::new))
        })
    }

    pub fn deselect_route(&self, origin: SelectionOrigin) -> Result<SelectionRecord, SessionError> {
        self.with_selection(|engine| engine.deselect_route(origin.into()))
    }

    /// Both selection UIs have rendered the latest state.
    pub fn settle_selection(&self) -> Result<(), SessionError> {
        self.engine()?.settle_selection();
        Ok(())
    }

    pub fn set_filter(&self, layer: FilterLayer, enabled: bool) -> Result<FilterState, SessionError> {
        let mut engine = self.engine()?;
        engine.set_filter(layer.into(), enabled);
        engine.flush();
        Ok(engine.filters().into())
    }

    pub fn selection(&self) -> Result<SelectionRecord, SessionError> {
        let engine = self.engine()?;
        Ok(SelectionRecord::new(
            engine.selection_state(),
            engine.filters(),
            &SelectionChange::Unchanged,
        ))
    }

    pub fn nearest_stop_routes(&self, position: LatLng) -> Result<Option<NearestStopRecord>, SessionError> {
        let engine = self.engine()?;
        Ok(engine
            .nearest_stop_routes(position.into())
            .map(|(stop, routes)| NearestStopRecord {
                stop_id: stop.id.to_string(),
                name: stop.name.to_string(),
                position: stop.position.into(),
                routes: routes.iter().map(ToString::to_string).collect(),
            }))
    }

    pub fn select_place(&self, place: Option<PlaceRecord>) -> Result<(), SessionError> {
        let mut engine = self.engine()?;
        engine.select_place(place.map(Into::into));
        engine.flush();
        Ok(())
    }

    pub fn set_search_results(&self, identity: u64, places: Vec<PlaceRecord>) -> Result<(), SessionError> {
        let mut engine = self.engine()?;
        engine.set_search_results(identity, places.into_iter().map(Into::into).collect());
        engine.flush();
        Ok(())
    }

    pub fn clear_search_results(&self) -> Result<(), SessionError> {
        let mut engine = self.engine()?;
        engine.clear_search_results();
        engine.flush();
        Ok(())
    }

    /// Fetches details for the "show details" sheet. Blocks on the host service.
    pub fn place_details(&self, place_id: String) -> Result<PlaceDetailsRecord, SessionError> {
        self.places.place_details(place_id)
    }

    /// Ends the session. Later calls fail with `SessionError::Closed`.
    pub fn teardown(&self) {
        if let Ok(mut driver) = self.driver.lock() {
            if let Some(handle) = driver.take() {
                handle.abort();
            }
        }
        if let Ok(mut engine) = self.engine.lock() {
            engine.teardown();
        }
    }
}

impl MapSession {
    fn engine(&self) -> Result<MutexGuard<'_, TransitOverlayEngine>, SessionError> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| SessionError::Runtime {
                reason: "engine lock poisoned".into(),
            })?;
        if engine.is_torn_down() {
            return Err(SessionError::Closed);
        }
        Ok(engine)
    }

    fn with_selection(
        &self,
        apply: impl FnOnce(&mut TransitOverlayEngine) -> SelectionChange,
    ) -> Result<SelectionRecord, SessionError> {
        let record = {
            let mut engine = self.engine()?;
            let change = apply(&mut *engine);
            engine.flush();
            SelectionRecord::new(engine.selection_state(), engine.filters(), &change)
        };

        if record.changed {
            self.observer.on_selection_changed(record.clone());
        }
        Ok(record)
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.teardown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn build_runtime() -> eyre::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("shuttle-engine")
        .enable_time()
        .build()
        .wrap_err("failed to start engine runtime")
}

fn build_provider(data: TransitData) -> eyre::Result<StaticTransitProvider> {
    let stops = data
        .stops
        .into_iter()
        .map(|stop| StopRecord {
            id: StopIdentifier::new(stop.id),
            name: stop.name.into(),
            position: stop.position.into(),
            priority: stop.importance.into(),
            routes: stop.routes.into_iter().map(RouteCode::new).collect(),
        })
        .collect();

    let places = data
        .places
        .into_iter()
        .map(|place| PointOfInterest {
            footprint: place.footprint(),
            id: PlaceIdentifier::new(place.id),
            name: place.name.into(),
            category: place.category.into(),
            position: place.position.into(),
        })
        .collect();

    let mut routes = Vec::with_capacity(data.routes.len());
    for route in data.routes {
        let code = RouteCode::new(&route.code);
        let checkpoints = route
            .checkpoints
            .iter()
            .map(|c| RouteCheckpoint::new(c.sequence, c.position.into()))
            .collect();

        let record = match &route.encoded_path {
            Some(encoded) => {
                RouteRecord::with_encoded_path(code, route.name, route.color, checkpoints, encoded)
                    .wrap_err_with(|| format!("route {}", route.code))?
            }
            None => RouteRecord::new(code, route.name, route.color, checkpoints, LineString::new(vec![])),
        };
        routes.push(record);
    }

    Ok(StaticTransitProvider::from_data(stops, places, routes))
}

/// Feeds asynchronous results back into the engine until the session ends.
async fn drive(
    engine: SharedEngine,
    observer: Arc<dyn SelectionObserver>,
    mut clicks: mpsc::UnboundedReceiver<ClickResolution>,
    mut snapshots: Option<mpsc::UnboundedReceiver<LiveSnapshot>>,
) {
    loop {
        tokio::select! {
            Some(resolution) = clicks.recv() => {
                let applied = {
                    let Ok(mut engine) = engine.lock() else { break };
                    let applied = engine.apply_click_resolution(resolution);
                    engine.flush();
                    applied
                };

                match applied {
                    Ok(place) => observer.on_place_selected(place.as_ref().map(PlaceRecord::from)),
                    Err(EngineError::StaleResult { request_id, latest }) => {
                        debug!(request_id, latest, "discarding superseded click");
                    }
                    Err(e) => error!("click resolution failed: {e}"),
                }
            }
            Some(snapshot) = next_snapshot(&mut snapshots) => {
                let Ok(mut engine) = engine.lock() else { break };
                engine.on_live_snapshot(snapshot);
                engine.flush();
            }
            else => break,
        }
    }
}

async fn next_snapshot(
    snapshots: &mut Option<mpsc::UnboundedReceiver<LiveSnapshot>>,
) -> Option<LiveSnapshot> {
    match snapshots {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
