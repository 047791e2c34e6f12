use std::sync::Arc;
use std::time::Duration;

use shuttle_transit::{LiveDataFeed, LiveSnapshot, RouteCode};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Background task polling the live feed for the routes in scope.
///
/// Each successful fetch is sent as a whole snapshot. A fetch that fails or
/// times out sends nothing, so the receiver keeps the route's previous vehicles.
pub struct LiveFeedPoller {
    scope: watch::Sender<Vec<RouteCode>>,
    handle: JoinHandle<()>,
}

impl LiveFeedPoller {
    pub fn spawn(
        runtime: &Handle,
        feed: Arc<dyn LiveDataFeed>,
        interval: Duration,
        timeout: Duration,
        scope: Vec<RouteCode>,
        snapshots: mpsc::UnboundedSender<LiveSnapshot>,
    ) -> Self {
        let (scope_tx, scope_rx) = watch::channel(scope);
        let handle = runtime.spawn(poll(feed, interval, timeout, scope_rx, snapshots));

        Self {
            scope: scope_tx,
            handle,
        }
    }

    /// Replaces the polled routes; takes effect on the next tick.
    pub fn set_scope(&self, routes: Vec<RouteCode>) {
        self.scope.send_if_modified(|current| {
            if *current == routes {
                false
            } else {
                *current = routes;
                true
            }
        });
    }

    pub fn scope(&self) -> Vec<RouteCode> {
        self.scope.borrow().clone()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for LiveFeedPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll(
    feed: Arc<dyn LiveDataFeed>,
    interval: Duration,
    timeout: Duration,
    scope: watch::Receiver<Vec<RouteCode>>,
    snapshots: mpsc::UnboundedSender<LiveSnapshot>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let routes = scope.borrow().clone();
        for route in routes {
            match tokio::time::timeout(timeout, feed.fetch_vehicles(&route)).await {
                Ok(Ok(vehicles)) => {
                    debug!(%route, count = vehicles.len(), "live snapshot");
                    if snapshots.send(LiveSnapshot::new(route, vehicles)).is_err() {
                        // Receiver is gone; nothing left to poll for
                        return;
                    }
                }
                Ok(Err(e)) => warn!(%route, "live feed failed, keeping previous vehicles: {e}"),
                Err(_) => warn!(%route, "live feed timed out, keeping previous vehicles"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use geo::Point;
    use shuttle_transit::network::traits::BoxFuture;
    use shuttle_transit::{DirectionFlag, LiveVehicle, TransitError, VehicleIdentifier};

    struct FlakyFeed {
        calls: Mutex<u32>,
    }

    impl LiveDataFeed for FlakyFeed {
        fn fetch_vehicles<'a>(
            &'a self,
            route: &'a RouteCode,
        ) -> BoxFuture<'a, shuttle_transit::Result<Vec<LiveVehicle>>> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            Box::pin(async move {
                match call {
                    // Second tick fails outright, third hangs past the timeout
                    2 => Err(TransitError::LookupFailed("502".into())),
                    3 => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok(vec![])
                    }
                    _ => Ok(vec![LiveVehicle {
                        vehicle_id: VehicleIdentifier::new(format!("bus-{call}")),
                        position: Point::new(-117.84, 33.64),
                        direction: DirectionFlag::Forward,
                        speed: 4.0,
                        route_code: route.clone(),
                    }]),
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_send_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = LiveFeedPoller::spawn(
            &Handle::current(),
            Arc::new(FlakyFeed { calls: Mutex::new(0) }),
            Duration::from_secs(5),
            Duration::from_secs(2),
            vec![RouteCode::new("A1")],
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.route_code, RouteCode::new("A1"));
        assert_eq!(first.vehicles[0].vehicle_id, VehicleIdentifier::new("bus-1"));

        // Ticks two and three are dropped, the fourth comes through
        let next = rx.recv().await.unwrap();
        assert_eq!(next.vehicles[0].vehicle_id, VehicleIdentifier::new("bus-4"));

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn scope_change_applies_on_next_tick() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = LiveFeedPoller::spawn(
            &Handle::current(),
            Arc::new(FlakyFeed { calls: Mutex::new(3) }),
            Duration::from_secs(5),
            Duration::from_secs(2),
            vec![RouteCode::new("A1")],
            tx,
        );

        assert_eq!(rx.recv().await.unwrap().route_code, RouteCode::new("A1"));

        poller.set_scope(vec![RouteCode::new("D2")]);
        assert_eq!(poller.scope(), vec![RouteCode::new("D2")]);
        assert_eq!(rx.recv().await.unwrap().route_code, RouteCode::new("D2"));

        drop(poller);
        assert!(rx.recv().await.is_none());
    }
}
