//! Turns map clicks into at most one resolved place.
//!
//! Every click gets a fresh request id and its own task. The task waits out the
//! debounce window, then tries the place attached to the click, a nearby search
//! and reverse geocoding in that order. A newer click cancels the older task
//! through a oneshot, and the receiver re-checks the id on arrival, so a slow
//! lookup can never overwrite a newer selection.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use geo::Point;
use shuttle_transit::{PlaceLookup, PlaceRef};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EngineConfig;

pub type RequestId = u64;

#[derive(Clone, Debug, PartialEq)]
pub struct ClickEvent {
    pub position: Point,
    /// Point of interest the surface hit-tested under the click, if any
    pub place: Option<PlaceRef>,
}

impl ClickEvent {
    pub fn at(position: Point) -> Self {
        Self {
            position,
            place: None,
        }
    }

    pub fn on_place(place: PlaceRef) -> Self {
        Self {
            position: place.position,
            place: Some(place),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickStatus {
    Pending,
    Resolved,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClickResolution {
    pub request_id: RequestId,
    pub status: ClickStatus,
    /// `None` on a resolved request means "no place here"
    pub result: Option<PlaceRef>,
}

#[derive(Clone, Copy, Debug)]
struct LookupSettings {
    debounce: Duration,
    radius_m: f64,
    timeout: Duration,
}

impl From<&EngineConfig> for LookupSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            debounce: config.debounce_window(),
            radius_m: config.nearby_radius_m,
            timeout: config.lookup_timeout(),
        }
    }
}

struct InFlight {
    request_id: RequestId,
    click: ClickEvent,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl InFlight {
    fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

pub struct ClickResolver {
    runtime: Handle,
    lookup: Arc<dyn PlaceLookup>,
    settings: LookupSettings,
    next_id: RequestId,
    latest: Arc<AtomicU64>,
    in_flight: Option<InFlight>,
    outcomes: mpsc::UnboundedSender<ClickResolution>,
}

impl ClickResolver {
    /// Resolutions, including cancellations, are delivered to `outcomes`.
    pub fn new(
        runtime: Handle,
        lookup: Arc<dyn PlaceLookup>,
        config: &EngineConfig,
        outcomes: mpsc::UnboundedSender<ClickResolution>,
    ) -> Self {
        Self {
            runtime,
            lookup,
            settings: LookupSettings::from(config),
            next_id: 0,
            latest: Arc::new(AtomicU64::new(0)),
            in_flight: None,
            outcomes,
        }
    }

    /// Starts resolving `click`, superseding any earlier click.
    ///
    /// Returns `None` when the click repeats the one still being resolved.
    pub fn submit(&mut self, click: ClickEvent) -> Option<RequestId> {
        if let Some(current) = &self.in_flight {
            if !current.handle.is_finished() && current.click == click {
                debug!(request_id = current.request_id, "ignoring duplicate click");
                return None;
            }
        }

        self.next_id += 1;
        let request_id = self.next_id;
        self.latest.store(request_id, Ordering::SeqCst);

        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = ResolveTask {
            request_id,
            click: click.clone(),
            lookup: Arc::clone(&self.lookup),
            settings: self.settings,
            latest: Arc::clone(&self.latest),
            outcomes: self.outcomes.clone(),
        };
        let handle = self.runtime.spawn(task.run(cancel_rx));

        self.in_flight = Some(InFlight {
            request_id,
            click,
            cancel: Some(cancel_tx),
            handle,
        });

        Some(request_id)
    }

    pub fn latest(&self) -> RequestId {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, request_id: RequestId) -> bool {
        request_id != 0 && request_id == self.latest()
    }

    /// Id of the click still being resolved, if any
    pub fn pending(&self) -> Option<RequestId> {
        self.in_flight
            .as_ref()
            .filter(|f| !f.handle.is_finished())
            .map(|f| f.request_id)
    }

    /// Cancels the outstanding click. Nothing it produces is applied afterwards.
    pub fn cancel_all(&mut self) {
        // Moving the latest id past every issued request invalidates late arrivals
        self.next_id += 1;
        self.latest.store(self.next_id, Ordering::SeqCst);

        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
    }
}

impl Drop for ClickResolver {
    fn drop(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            previous.handle.abort();
        }
    }
}

struct ResolveTask {
    request_id: RequestId,
    click: ClickEvent,
    lookup: Arc<dyn PlaceLookup>,
    settings: LookupSettings,
    latest: Arc<AtomicU64>,
    outcomes: mpsc::UnboundedSender<ClickResolution>,
}

impl ResolveTask {
    async fn run(self, cancel: oneshot::Receiver<()>) {
        let resolved = tokio::select! {
            biased;
            _ = cancel => None,
            result = self.resolve() => Some(result),
        };

        let status = match &resolved {
            Some(_) if self.latest.load(Ordering::SeqCst) == self.request_id => {
                ClickStatus::Resolved
            }
            _ => ClickStatus::Cancelled,
        };
        let result = match status {
            ClickStatus::Resolved => resolved.flatten(),
            _ => None,
        };

        debug!(request_id = self.request_id, ?status, "click finished");
        let _ = self.outcomes.send(ClickResolution {
            request_id: self.request_id,
            status,
            result,
        });
    }

    async fn resolve(&self) -> Option<PlaceRef> {
        tokio::time::sleep(self.settings.debounce).await;

        if let Some(place) = &self.click.place {
            return Some(place.clone());
        }

        let position = self.click.position;
        let nearby = self
            .bounded("nearby search", self.lookup.search_nearby(position, self.settings.radius_m))
            .await;
        if nearby.is_some() {
            return nearby;
        }

        self.bounded("reverse geocode", self.lookup.reverse_geocode(position))
            .await
    }

    /// Runs one lookup under the timeout; failures read as "no place".
    async fn bounded<F>(&self, stage: &'static str, lookup: F) -> Option<PlaceRef>
    where
        F: Future<Output = shuttle_transit::Result<Option<PlaceRef>>>,
    {
        match tokio::time::timeout(self.settings.timeout, lookup).await {
            Ok(Ok(place)) => place,
            Ok(Err(e)) => {
                warn!(request_id = self.request_id, stage, "lookup failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    request_id = self.request_id,
                    stage,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "lookup timed out"
                );
                None
            }
        }
    }
}
