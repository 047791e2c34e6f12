//! One active route, fed by two UIs.
//!
//! The filter panel and the nearest-stop tab can each pick a route. This
//! machine is the single writer of the result: it decides which route is
//! active, hides the non-route layers while one is, and puts them back exactly
//! as they were once the user is done with routes.

use shuttle_transit::RouteCode;
use tracing::{debug, warn};

/// Where a route selection came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectionSource {
    FilterPanel,
    NearestStopTab,
}

/// Non-route layer toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilterSnapshot {
    pub landmarks: bool,
    pub academic: bool,
    pub residences: bool,
    pub bus_stops: bool,
}

impl FilterSnapshot {
    /// Everything off, used while a route is shown
    pub const ROUTE_VIEW: FilterSnapshot = FilterSnapshot {
        landmarks: false,
        academic: false,
        residences: false,
        bus_stops: false,
    };

    /// Restored when a deselection finds no snapshot
    pub const FALLBACK: FilterSnapshot = FilterSnapshot {
        landmarks: true,
        academic: false,
        residences: false,
        bus_stops: true,
    };

    pub fn with(mut self, key: FilterKey, value: bool) -> Self {
        match key {
            FilterKey::Landmarks => self.landmarks = value,
            FilterKey::Academic => self.academic = value,
            FilterKey::Residences => self.residences = value,
            FilterKey::BusStops => self.bus_stops = value,
        }
        self
    }
}

impl Default for FilterSnapshot {
    fn default() -> Self {
        Self::FALLBACK
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Landmarks,
    Academic,
    Residences,
    BusStops,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteSelectionState {
    NoRouteSelected,
    RouteSelectedViaFilter(RouteCode),
    RouteSelectedViaTab(RouteCode),
}

/// Result of feeding one input to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionChange {
    Activated {
        route: RouteCode,
        source: SelectionSource,
    },
    Switched {
        from: RouteCode,
        to: RouteCode,
        source: SelectionSource,
    },
    /// The active route now belongs to the other source
    Adopted {
        route: RouteCode,
        source: SelectionSource,
    },
    Deactivated {
        route: RouteCode,
        restored: FilterSnapshot,
    },
    /// An echo of a change this machine just made, dropped to break the loop
    Suppressed,
    Unchanged,
}

impl SelectionChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, SelectionChange::Suppressed | SelectionChange::Unchanged)
    }
}

/// Marks the source that caused the latest change, so the other source's
/// notification about that same change is not fed back in.
#[derive(Clone, Debug, PartialEq, Eq)]
struct OriginGuard {
    origin: SelectionSource,
    route: Option<RouteCode>,
}

#[derive(Debug)]
pub struct RouteSelectionMachine {
    active: Option<(RouteCode, SelectionSource)>,
    filters: FilterSnapshot,
    saved: Option<FilterSnapshot>,
    guard: Option<OriginGuard>,
}

impl RouteSelectionMachine {
    pub fn new(filters: FilterSnapshot) -> Self {
        Self {
            active: None,
            filters,
            saved: None,
            guard: None,
        }
    }

    pub fn state(&self) -> RouteSelectionState {
        match &self.active {
            None => RouteSelectionState::NoRouteSelected,
            Some((route, SelectionSource::FilterPanel)) => {
                RouteSelectionState::RouteSelectedViaFilter(route.clone())
            }
            Some((route, SelectionSource::NearestStopTab)) => {
                RouteSelectionState::RouteSelectedViaTab(route.clone())
            }
        }
    }

    pub fn active_route(&self) -> Option<&RouteCode> {
        self.active.as_ref().map(|(route, _)| route)
    }

    pub fn active_source(&self) -> Option<SelectionSource> {
        self.active.as_ref().map(|(_, source)| *source)
    }

    pub fn filters(&self) -> FilterSnapshot {
        self.filters
    }

    pub fn saved_filters(&self) -> Option<FilterSnapshot> {
        self.saved
    }

    /// A user picked `route` in `source`.
    ///
    /// Picking the active route again from the same source deselects it.
    pub fn select(&mut self, source: SelectionSource, route: RouteCode) -> SelectionChange {
        let change = match self.active.take() {
            None => {
                self.saved = Some(self.filters);
                self.filters = FilterSnapshot::ROUTE_VIEW;
                self.active = Some((route.clone(), source));
                SelectionChange::Activated { route, source }
            }
            Some((current, current_source)) if current == route && current_source == source => {
                self.restore(current)
            }
            Some((current, _)) if current == route => {
                // The snapshot stays; only ownership moves
                self.active = Some((route.clone(), source));
                SelectionChange::Adopted { route, source }
            }
            Some((current, _)) => {
                self.active = Some((route.clone(), source));
                SelectionChange::Switched {
                    from: current,
                    to: route,
                    source,
                }
            }
        };

        self.arm_guard(source, &change);
        self.debug_check();
        change
    }

    /// A source reports what it currently shows.
    ///
    /// Reports that merely echo the latest change made through the other source
    /// are suppressed once.
    pub fn sync(&mut self, source: SelectionSource, reported: Option<RouteCode>) -> SelectionChange {
        if let Some(guard) = &self.guard {
            if guard.origin != source && guard.route == reported {
                debug!(?source, route = ?reported, "suppressing echoed selection");
                self.guard = None;
                return SelectionChange::Suppressed;
            }
        }

        match (reported, self.active.clone()) {
            (Some(route), Some((current, _))) if route == current => SelectionChange::Unchanged,
            (Some(route), _) => self.select(source, route),
            (None, Some((current, current_source))) if current_source == source => {
                self.active = None;
                let change = self.restore(current);
                self.arm_guard(source, &change);
                self.debug_check();
                change
            }
            // The other source never showed the active route, so it has nothing to clear
            (None, _) => SelectionChange::Unchanged,
        }
    }

    /// Explicit "clear route" from the user.
    pub fn deselect(&mut self, source: SelectionSource) -> SelectionChange {
        let Some((current, _)) = self.active.take() else {
            return SelectionChange::Unchanged;
        };

        let change = self.restore(current);
        self.arm_guard(source, &change);
        self.debug_check();
        change
    }

    /// Toggle a non-route layer. While a route is active this changes the
    /// live filters only; the snapshot restored on deselection is untouched.
    pub fn set_filter(&mut self, key: FilterKey, value: bool) -> bool {
        let updated = self.filters.with(key, value);
        let changed = updated != self.filters;
        self.filters = updated;
        changed
    }

    /// The UI has rendered the latest state; pending echoes can no longer arrive.
    pub fn settle(&mut self) {
        self.guard = None;
    }

    fn restore(&mut self, route: RouteCode) -> SelectionChange {
        let restored = self.saved.take().unwrap_or_else(|| {
            warn!(%route, "no filter snapshot to restore, using defaults");
            FilterSnapshot::FALLBACK
        });
        self.filters = restored;

        SelectionChange::Deactivated { route, restored }
    }

    fn arm_guard(&mut self, origin: SelectionSource, change: &SelectionChange) {
        if change.is_change() {
            self.guard = Some(OriginGuard {
                origin,
                route: self.active_route().cloned(),
            });
        }
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.active.is_some(),
            self.saved.is_some(),
            "a filter snapshot must exist exactly while a route is active"
        );
    }
}

impl Default for RouteSelectionMachine {
    fn default() -> Self {
        Self::new(FilterSnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTER: SelectionSource = SelectionSource::FilterPanel;
    const TAB: SelectionSource = SelectionSource::NearestStopTab;

    fn start() -> (RouteSelectionMachine, FilterSnapshot) {
        let original = FilterSnapshot {
            landmarks: true,
            academic: false,
            residences: false,
            bus_stops: true,
        };
        (RouteSelectionMachine::new(original), original)
    }

    fn a1() -> RouteCode {
        RouteCode::new("A1")
    }

    fn d2() -> RouteCode {
        RouteCode::new("D2")
    }

    #[test]
    fn select_then_deselect_restores_snapshot() {
        let (mut machine, original) = start();

        machine.select(FILTER, a1());
        assert_eq!(machine.state(), RouteSelectionState::RouteSelectedViaFilter(a1()));
        assert_eq!(machine.filters(), FilterSnapshot::ROUTE_VIEW);

        let change = machine.select(FILTER, a1());
        assert_eq!(change, SelectionChange::Deactivated { route: a1(), restored: original });
        assert_eq!(machine.state(), RouteSelectionState::NoRouteSelected);
        assert_eq!(machine.filters(), original);
        assert!(machine.saved_filters().is_none());
    }

    #[test]
    fn route_chain_restores_original_once() {
        let (mut machine, original) = start();

        machine.select(FILTER, a1());
        let switched = machine.select(TAB, d2());
        assert_eq!(
            switched,
            SelectionChange::Switched { from: a1(), to: d2(), source: TAB }
        );
        assert_eq!(machine.saved_filters(), Some(original));

        machine.select(TAB, d2());
        assert_eq!(machine.filters(), original);
        assert_eq!(machine.state(), RouteSelectionState::NoRouteSelected);
    }

    #[test]
    fn filters_changed_during_route_view_do_not_leak_into_restore() {
        let (mut machine, original) = start();

        machine.select(FILTER, a1());
        assert!(machine.set_filter(FilterKey::Residences, true));
        assert!(machine.filters().residences);

        machine.deselect(FILTER);
        assert_eq!(machine.filters(), original);
    }

    #[test]
    fn echo_from_other_source_is_suppressed_once() {
        let (mut machine, _) = start();

        machine.select(FILTER, a1());
        assert_eq!(machine.sync(TAB, Some(a1())), SelectionChange::Suppressed);

        // Guard is spent; a genuine report is processed again
        assert_eq!(machine.sync(TAB, Some(a1())), SelectionChange::Unchanged);
        assert_eq!(machine.state(), RouteSelectionState::RouteSelectedViaFilter(a1()));
    }

    #[test]
    fn echo_of_deselection_does_not_reactivate() {
        let (mut machine, original) = start();

        machine.select(TAB, a1());
        machine.settle();
        machine.select(TAB, a1());

        // The filter panel still showed A1 and now reports it cleared
        assert_eq!(machine.sync(FILTER, None), SelectionChange::Suppressed);
        assert_eq!(machine.filters(), original);
    }

    #[test]
    fn settle_expires_the_guard() {
        let (mut machine, _) = start();

        machine.select(FILTER, a1());
        machine.settle();

        // A later tab report of a different route is a real change
        let change = machine.sync(TAB, Some(d2()));
        assert!(matches!(change, SelectionChange::Switched { .. }));
    }

    #[test]
    fn sync_none_from_owner_deselects() {
        let (mut machine, original) = start();

        machine.select(TAB, a1());
        machine.settle();

        assert_eq!(machine.sync(FILTER, None), SelectionChange::Unchanged);
        let change = machine.sync(TAB, None);
        assert_eq!(change, SelectionChange::Deactivated { route: a1(), restored: original });
    }

    #[test]
    fn same_route_from_other_source_keeps_snapshot() {
        let (mut machine, original) = start();

        machine.select(FILTER, a1());
        machine.settle();
        assert_eq!(
            machine.select(TAB, a1()),
            SelectionChange::Adopted { route: a1(), source: TAB }
        );
        assert_eq!(machine.state(), RouteSelectionState::RouteSelectedViaTab(a1()));
        assert_eq!(machine.filters(), FilterSnapshot::ROUTE_VIEW);

        machine.select(TAB, a1());
        assert_eq!(machine.filters(), original);
    }

    #[test]
    fn adopted_route_is_reported_and_its_echo_suppressed() {
        let (mut machine, _) = start();

        machine.select(FILTER, a1());
        machine.settle();

        let change = machine.select(TAB, a1());
        assert!(change.is_change());

        // The filter panel mirrors the new owner and reports A1 back
        assert_eq!(machine.sync(FILTER, Some(a1())), SelectionChange::Suppressed);

        // Tapping A1 in the filter panel now takes it back rather than toggling off
        machine.settle();
        assert_eq!(
            machine.select(FILTER, a1()),
            SelectionChange::Adopted { route: a1(), source: FILTER }
        );
        assert_eq!(machine.state(), RouteSelectionState::RouteSelectedViaFilter(a1()));
    }

    #[test]
    fn deselect_without_snapshot_restores_fallback() {
        let mut machine = RouteSelectionMachine {
            active: Some((a1(), FILTER)),
            filters: FilterSnapshot::ROUTE_VIEW,
            saved: None,
            guard: None,
        };

        let change = machine.deselect(FILTER);
        assert_eq!(
            change,
            SelectionChange::Deactivated { route: a1(), restored: FilterSnapshot::FALLBACK }
        );
        assert_eq!(machine.filters(), FilterSnapshot::FALLBACK);
        assert_eq!(machine.state(), RouteSelectionState::NoRouteSelected);
    }

    #[test]
    fn deselect_without_route_is_a_no_op() {
        let (mut machine, original) = start();

        assert_eq!(machine.deselect(FILTER), SelectionChange::Unchanged);
        assert_eq!(machine.filters(), original);
    }
}
