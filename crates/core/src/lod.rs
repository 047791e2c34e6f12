//! Zoom-driven level of detail.
//!
//! Everything here is a pure function of the integer zoom level. The overlay
//! scene asks for a [`LodPlan`] on every rebuild and only ever changes
//! visibility and style from it, never which overlays exist.

use shuttle_transit::StopPriority;

/// First zoom of the medium tier
pub const MEDIUM_ZOOM: u8 = 15;
/// First zoom of the close tier
pub const CLOSE_ZOOM: u8 = 17;

/// Label font size in points, indexed by `zoom - 14` and clamped at both ends
const LABEL_FONT_SIZES: [f32; 6] = [10.0, 11.0, 12.0, 13.0, 14.0, 16.0];

/// Icon scale for landmark, printer and sports markers, same indexing
const ICON_SCALES: [f32; 6] = [0.6, 0.8, 1.0, 1.15, 1.3, 1.5];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZoomTier {
    Far,
    Medium,
    Close,
}

pub fn tier(zoom: u8) -> ZoomTier {
    match zoom {
        z if z >= CLOSE_ZOOM => ZoomTier::Close,
        z if z >= MEDIUM_ZOOM => ZoomTier::Medium,
        _ => ZoomTier::Far,
    }
}

/// Visibility and style decisions for every overlay family at one zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodPlan {
    pub zoom: u8,
    pub tier: ZoomTier,
    /// Circular stop markers only appear close in
    pub stop_markers_visible: bool,
    /// Least important stop priority whose label is still shown
    pub label_min_priority: StopPriority,
    pub label_font_size: f32,
    pub icon_scale: f32,
    pub hall_labels_visible: bool,
}

impl LodPlan {
    pub fn for_zoom(zoom: u8) -> Self {
        let tier = tier(zoom);
        let step = usize::from(zoom.clamp(14, 19) - 14);

        Self {
            zoom,
            tier,
            stop_markers_visible: tier == ZoomTier::Close,
            label_min_priority: match tier {
                ZoomTier::Close => StopPriority::Minor,
                ZoomTier::Medium => StopPriority::Major,
                ZoomTier::Far => StopPriority::Essential,
            },
            label_font_size: LABEL_FONT_SIZES[step],
            icon_scale: ICON_SCALES[step],
            hall_labels_visible: zoom >= CLOSE_ZOOM,
        }
    }

    /// Stop labels follow their own priority rule, independent of the marker.
    pub fn stop_label_visible(&self, priority: StopPriority) -> bool {
        priority <= self.label_min_priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIORITIES: [StopPriority; 3] =
        [StopPriority::Essential, StopPriority::Major, StopPriority::Minor];

    fn visible_detail(plan: &LodPlan) -> usize {
        PRIORITIES.iter().filter(|p| plan.stop_label_visible(**p)).count()
            + usize::from(plan.stop_markers_visible)
            + usize::from(plan.hall_labels_visible)
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier(0), ZoomTier::Far);
        assert_eq!(tier(14), ZoomTier::Far);
        assert_eq!(tier(15), ZoomTier::Medium);
        assert_eq!(tier(16), ZoomTier::Medium);
        assert_eq!(tier(17), ZoomTier::Close);
        assert_eq!(tier(22), ZoomTier::Close);
    }

    #[test]
    fn detail_never_regresses_as_zoom_increases() {
        for zoom in 0..22u8 {
            let lower = LodPlan::for_zoom(zoom);
            let higher = LodPlan::for_zoom(zoom + 1);

            assert!(lower.tier <= higher.tier);
            assert!(visible_detail(&lower) <= visible_detail(&higher), "zoom {zoom}");
            assert!(lower.label_font_size <= higher.label_font_size);
            assert!(lower.icon_scale <= higher.icon_scale);
        }
    }

    #[test]
    fn labels_can_show_without_markers() {
        let medium = LodPlan::for_zoom(16);
        assert!(!medium.stop_markers_visible);
        assert!(medium.stop_label_visible(StopPriority::Major));
        assert!(!medium.stop_label_visible(StopPriority::Minor));

        let far = LodPlan::for_zoom(13);
        assert!(far.stop_label_visible(StopPriority::Essential));
        assert!(!far.stop_label_visible(StopPriority::Major));
    }

    #[test]
    fn style_lookup_table() {
        assert_eq!(LodPlan::for_zoom(10).label_font_size, 10.0);
        assert_eq!(LodPlan::for_zoom(16).icon_scale, 1.0);
        assert_eq!(LodPlan::for_zoom(21).icon_scale, 1.5);
        assert!(!LodPlan::for_zoom(16).hall_labels_visible);
        assert!(LodPlan::for_zoom(17).hall_labels_visible);
    }
}
