//! Host-implemented interfaces and their adapters to the engine's traits.

use std::sync::Arc;

use geo::{Point, Rect};
use shuttle_core::overlay::{OverlayDescriptor, OverlayId, OverlayPatch, RenderingSurface};
use shuttle_core::transit::network::traits::BoxFuture;
use shuttle_core::transit::{
    LiveDataFeed, LiveVehicle, PlaceDetails, PlaceIdentifier, PlaceLookup, PlaceRef, RouteCode,
    TransitError,
};

use crate::error::SessionError;
use crate::records::{
    LatLng, OverlayPatchRecord, OverlayRecord, PlaceDetailsRecord, PlaceRecord, SelectionRecord,
    VehicleRecord,
};

/// The host's map view.
#[uniffi::export(with_foreign)]
pub trait MapSurface: Send + Sync {
    fn draw_overlay(&self, overlay: OverlayRecord);
    fn update_overlay(&self, id: String, patch: OverlayPatchRecord);
    fn remove_overlay(&self, id: String);
    fn fit_to_bounds(&self, south_west: LatLng, north_east: LatLng, padding: f64);
}

/// Place search and geocoding. Called off the main thread; may block.
#[uniffi::export(with_foreign)]
pub trait PlaceService: Send + Sync {
    fn search_nearby(&self, position: LatLng, radius_m: f64) -> Result<Option<PlaceRecord>, SessionError>;
    fn reverse_geocode(&self, position: LatLng) -> Result<Option<PlaceRecord>, SessionError>;
    fn place_details(&self, place_id: String) -> Result<PlaceDetailsRecord, SessionError>;
}

/// Live vehicle positions. Called off the main thread; may block.
#[uniffi::export(with_foreign)]
pub trait VehicleFeed: Send + Sync {
    fn fetch_vehicles(&self, route_code: String) -> Result<Vec<VehicleRecord>, SessionError>;
}

/// Receives state the host UI has to mirror.
#[uniffi::export(with_foreign)]
pub trait SelectionObserver: Send + Sync {
    fn on_selection_changed(&self, selection: SelectionRecord);
    /// A click resolved; `None` clears the details sheet
    fn on_place_selected(&self, place: Option<PlaceRecord>);
}

pub(crate) struct SurfaceBridge(pub Arc<dyn MapSurface>);

impl RenderingSurface for SurfaceBridge {
    fn draw_overlay(&mut self, descriptor: &OverlayDescriptor) {
        self.0.draw_overlay(descriptor.into());
    }

    fn update_overlay(&mut self, id: &OverlayId, patch: &OverlayPatch) {
        self.0.update_overlay(id.to_string(), patch.into());
    }

    fn remove_overlay(&mut self, id: &OverlayId) {
        self.0.remove_overlay(id.to_string());
    }

    fn fit_to_bounds(&mut self, bounds: Rect, padding: f64) {
        self.0
            .fit_to_bounds(bounds.min().into(), bounds.max().into(), padding);
    }
}

/// Runs a blocking host call on tokio's blocking pool.
async fn off_thread<T, F>(call: F) -> shuttle_core::transit::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| TransitError::LookupFailed(e.to_string()))?
        .map_err(|e| TransitError::LookupFailed(e.to_string()))
}

pub(crate) struct PlaceBridge(pub Arc<dyn PlaceService>);

impl PlaceLookup for PlaceBridge {
    fn search_nearby<'a>(
        &'a self,
        point: Point,
        radius_m: f64,
    ) -> BoxFuture<'a, shuttle_core::transit::Result<Option<PlaceRef>>> {
        let service = Arc::clone(&self.0);
        Box::pin(async move {
            let found = off_thread(move || service.search_nearby(point.into(), radius_m)).await?;
            Ok(found.map(PlaceRef::from))
        })
    }

    fn reverse_geocode<'a>(
        &'a self,
        point: Point,
    ) -> BoxFuture<'a, shuttle_core::transit::Result<Option<PlaceRef>>> {
        let service = Arc::clone(&self.0);
        Box::pin(async move {
            let found = off_thread(move || service.reverse_geocode(point.into())).await?;
            Ok(found.map(PlaceRef::from))
        })
    }

    fn place_details<'a>(
        &'a self,
        id: &'a PlaceIdentifier,
    ) -> BoxFuture<'a, shuttle_core::transit::Result<PlaceDetails>> {
        let service = Arc::clone(&self.0);
        let id = id.to_string();
        Box::pin(async move {
            let details = off_thread(move || service.place_details(id)).await?;
            Ok(details.into())
        })
    }
}

pub(crate) struct FeedBridge(pub Arc<dyn VehicleFeed>);

impl LiveDataFeed for FeedBridge {
    fn fetch_vehicles<'a>(
        &'a self,
        route: &'a RouteCode,
    ) -> BoxFuture<'a, shuttle_core::transit::Result<Vec<LiveVehicle>>> {
        let feed = Arc::clone(&self.0);
        let code = route.to_string();
        Box::pin(async move {
            let vehicles = off_thread(move || feed.fetch_vehicles(code)).await?;
            Ok(vehicles.into_iter().map(LiveVehicle::from).collect())
        })
    }
}
