use geo::Rect;

use crate::overlay::{OverlayDescriptor, OverlayId, OverlayPatch};

/// The map provider that actually draws overlays.
///
/// The reconciler is its only caller, so implementations never see a
/// create for an id that already exists or an update/remove for one that
/// does not.
pub trait RenderingSurface: Send {
    fn draw_overlay(&mut self, descriptor: &OverlayDescriptor);
    fn update_overlay(&mut self, id: &OverlayId, patch: &OverlayPatch);
    fn remove_overlay(&mut self, id: &OverlayId);
    /// Move the camera so `bounds` is fully visible with `padding` screen pixels to spare
    fn fit_to_bounds(&mut self, bounds: Rect, padding: f64);
}
