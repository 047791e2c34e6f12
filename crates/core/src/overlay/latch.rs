//! One-shot viewport fitting per logical result set.

use std::collections::HashMap;

use shuttle_transit::RouteCode;

/// Identity of a logical result set drawn on the map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResultSetId {
    /// The path of the selected route
    RoutePath(RouteCode),
    /// A batch of place search results, identified by the caller
    SearchResults(u64),
}

impl ResultSetId {
    pub fn slot(&self) -> FitSlot {
        match self {
            ResultSetId::RoutePath(_) => FitSlot::Route,
            ResultSetId::SearchResults(_) => FitSlot::Search,
        }
    }
}

/// Independent latches: a route and a search result set can both be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FitSlot {
    Route,
    Search,
}

/// Remembers which result set each slot was last fitted to.
///
/// A slot stays latched for as long as the same identity keeps appearing. When
/// the identity changes, or the slot is empty for a pass, the latch resets.
#[derive(Debug, Default)]
pub struct BoundsFitLatch {
    fitted: HashMap<FitSlot, ResultSetId>,
}

impl BoundsFitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result sets present in this pass and return the ones that
    /// have not been fitted yet.
    pub fn observe<'a>(&mut self, present: impl IntoIterator<Item = &'a ResultSetId>) -> Vec<ResultSetId> {
        let mut current: HashMap<FitSlot, ResultSetId> = HashMap::new();
        for id in present {
            current.entry(id.slot()).or_insert_with(|| id.clone());
        }

        let mut needs_fit: Vec<ResultSetId> = current
            .values()
            .filter(|id| self.fitted.get(&id.slot()) != Some(*id))
            .cloned()
            .collect();
        needs_fit.sort_by_key(|id| id.slot() == FitSlot::Search);

        self.fitted = current;
        needs_fit
    }

    pub fn is_latched(&self, id: &ResultSetId) -> bool {
        self.fitted.get(&id.slot()) == Some(id)
    }

    pub fn reset(&mut self) {
        self.fitted.clear();
    }
}
