//! Minimal-diff application of a desired overlay set to the rendering surface.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use shuttle_transit::spatial::bounding_rect;
use tracing::{debug, warn};

use crate::overlay::{
    BoundsFitLatch, OverlayDescriptor, OverlayId, OverlayPatch, RenderingSurface, ResultSetId,
};

/// What one reconciliation pass did to the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Desired overlays rejected for invalid geometry
    pub dropped: usize,
    pub fitted: usize,
}

impl ReconcileReport {
    /// True if the surface was not touched at all
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0 && self.fitted == 0
    }
}

/// Sole owner of the overlays materialized on the surface.
pub struct OverlayReconciler {
    surface: Box<dyn RenderingSurface>,
    materialized: HashMap<OverlayId, OverlayDescriptor>,
    latch: BoundsFitLatch,
    fit_padding: f64,
}

impl OverlayReconciler {
    pub fn new(surface: Box<dyn RenderingSurface>, fit_padding: f64) -> Self {
        Self {
            surface,
            materialized: HashMap::new(),
            latch: BoundsFitLatch::new(),
            fit_padding,
        }
    }

    pub fn get(&self, id: &OverlayId) -> Option<&OverlayDescriptor> {
        self.materialized.get(id)
    }

    pub fn len(&self) -> usize {
        self.materialized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materialized.is_empty()
    }

    /// Materialized overlays in draw order
    pub fn materialized(&self) -> impl Iterator<Item = &OverlayDescriptor> {
        self.materialized
            .values()
            .sorted_by(|a, b| a.layer.cmp(&b.layer).then_with(|| a.id.cmp(&b.id)))
    }

    /// Bring the surface in line with `desired`.
    ///
    /// Overlays with an unchanged id and kind are patched in place, new ones
    /// are drawn, and anything no longer desired is removed. Calling this
    /// twice with the same input touches the surface only the first time.
    pub fn reconcile(&mut self, desired: Vec<OverlayDescriptor>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut seen = HashSet::new();
        let mut valid = Vec::with_capacity(desired.len());
        for descriptor in desired {
            if let Err(error) = descriptor.validate() {
                warn!(%error, "dropping overlay");
                report.dropped += 1;
                continue;
            }
            if !seen.insert(descriptor.id.clone()) {
                warn!(id = %descriptor.id, "duplicate overlay id, keeping the first");
                report.dropped += 1;
                continue;
            }
            valid.push(descriptor);
        }

        // Creation order follows draw order so surfaces that stack by insertion agree
        valid.sort_by(|a, b| a.layer.cmp(&b.layer).then_with(|| a.id.cmp(&b.id)));

        let stale: Vec<OverlayId> = self
            .materialized
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .sorted()
            .collect();
        for id in stale {
            self.surface.remove_overlay(&id);
            self.materialized.remove(&id);
            report.removed += 1;
        }

        for descriptor in &valid {
            match self.materialized.get(&descriptor.id) {
                Some(current) if current.kind() == descriptor.kind() => {
                    let patch = OverlayPatch::between(current, descriptor);
                    if !patch.is_empty() {
                        self.surface.update_overlay(&descriptor.id, &patch);
                        report.updated += 1;
                    }
                }
                Some(_) => {
                    // Same id, different kind: not the same overlay
                    self.surface.remove_overlay(&descriptor.id);
                    self.surface.draw_overlay(descriptor);
                    report.removed += 1;
                    report.created += 1;
                }
                None => {
                    self.surface.draw_overlay(descriptor);
                    report.created += 1;
                }
            }
        }

        let present: Vec<&ResultSetId> = valid.iter().filter_map(|d| d.result_set.as_ref()).collect();
        for result_set in self.latch.observe(present) {
            let points = valid
                .iter()
                .filter(|d| d.result_set.as_ref() == Some(&result_set))
                .flat_map(|d| d.shape.points());

            if let Some(bounds) = bounding_rect(points) {
                debug!(?result_set, "fitting viewport to new result set");
                self.surface.fit_to_bounds(bounds, self.fit_padding);
                report.fitted += 1;
            }
        }

        self.materialized = valid.into_iter().map(|d| (d.id.clone(), d)).collect();
        report
    }

    /// Remove everything from the surface and forget all latches.
    pub fn clear(&mut self) -> usize {
        let ids: Vec<OverlayId> = self.materialized.keys().cloned().sorted().collect();
        for id in &ids {
            self.surface.remove_overlay(id);
        }
        self.materialized.clear();
        self.latch.reset();
        ids.len()
    }
}
