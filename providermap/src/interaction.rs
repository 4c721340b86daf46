//! Clustering and pointer interaction.
//!
//! Each handler is split into a resolution step that reads the surface and
//! props and returns a plan, and an apply step that performs it. Stale
//! references (a cluster that vanished between the click and the lookup, a
//! feature without an id) resolve to "do nothing" rather than an error.

use std::collections::HashMap;

use tracing::debug;

use crate::geo::{Feature, ScreenPoint, PROP_CLUSTER_ID, PROP_NAME, PROP_POINT_COUNT, PROP_TYPE_ID};
use crate::model::{MapProps, ProviderId, StateHooks};
use crate::provision::{CLUSTER_TEXT_LAYER, PROVIDER_SOURCE};
use crate::surface::{EaseOptions, MapSurface, MarkerHandle, PopupHandle, PopupSpec, SurfaceError};

/// Tab index of the provider detail panel.
pub const PROVIDER_DETAIL_TAB: usize = 1;

/// CSS class of provider name popups.
pub const NAME_POPUP_CLASS: &str = "name-popup";

/// CSS class of cluster preview popups.
pub const CLUSTER_POPUP_CLASS: &str = "cluster-popup";

/// Zoom to ease to after clicking a cluster.
///
/// Normally the expansion zoom. When the map is already at or past it (a
/// degenerate cluster that never splits at this zoom), go one level deeper
/// so the click always has a visible effect.
pub fn target_expansion_zoom(current: f64, expansion: f64) -> f64 {
    if current >= expansion {
        current + 1.0
    } else {
        expansion
    }
}

/// Work out where a cluster click should move the camera.
///
/// Returns `None` when the cluster cannot be resolved any more.
pub fn resolve_cluster_click<S: MapSurface>(
    surface: &S,
    point: ScreenPoint,
    event_features: &[Feature],
) -> Option<EaseOptions> {
    let rendered = surface.query_rendered_features(point, &[CLUSTER_TEXT_LAYER]);
    let cluster = rendered.first().or_else(|| event_features.first())?;

    let cluster_id = cluster.u64_property(PROP_CLUSTER_ID)?;
    let center = cluster.point_coordinates()?;

    let expansion = match surface.cluster_expansion_zoom(PROVIDER_SOURCE, cluster_id) {
        Ok(zoom) => zoom,
        Err(e) => {
            debug!(cluster_id, error = %e, "Cluster click ignored");
            return None;
        }
    };

    Some(EaseOptions {
        center,
        zoom: target_expansion_zoom(surface.zoom(), expansion),
    })
}

/// Ease into a clicked cluster. Returns whether the camera moved.
pub fn handle_cluster_click<S: MapSurface>(
    surface: &mut S,
    point: ScreenPoint,
    event_features: &[Feature],
) -> bool {
    match resolve_cluster_click(surface, point, event_features) {
        Some(ease) => {
            debug!(center = %ease.center, zoom = ease.zoom, "Easing into cluster");
            surface.ease_to(&ease);
            true
        }
        None => false,
    }
}

/// What a click on a provider pin or selection marker should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointClick {
    /// Provider is highlighted and its detail panel is already open.
    AlreadyDisplayed(ProviderId),
    /// Open the provider's detail panel, selecting it first if needed.
    Display { id: ProviderId, select: bool },
}

/// Provider id of the topmost clicked feature.
pub fn clicked_provider(features: &[Feature]) -> Option<ProviderId> {
    features.first()?.provider_id()
}

/// Decide what clicking provider `id` does under the current props.
pub fn plan_point_click(props: &MapProps, id: &ProviderId) -> PointClick {
    if props.is_selected_and_displayed(id) {
        return PointClick::AlreadyDisplayed(id.clone());
    }
    PointClick::Display {
        id: id.clone(),
        select: !props.is_highlighted(id),
    }
}

/// Issue the hook calls for a click plan. Returns whether any hook ran.
pub fn apply_point_click<H: StateHooks>(hooks: &mut H, click: &PointClick) -> bool {
    match click {
        PointClick::AlreadyDisplayed(id) => {
            debug!(provider = %id, "Provider already displayed");
            false
        }
        PointClick::Display { id, select } => {
            if *select {
                hooks.select_provider(id);
            }
            hooks.display_provider_information(id);
            hooks.select_tab(PROVIDER_DETAIL_TAB);
            true
        }
    }
}

/// Name popup for a hovered provider feature.
pub fn name_popup(feature: &Feature, offset: f64) -> Option<PopupSpec> {
    let position = feature.point_coordinates()?;
    let name = feature.string_property(PROP_NAME)?;
    Some(PopupSpec::label(position, vec![name], NAME_POPUP_CLASS, offset))
}

/// Preview popup listing the members of a hovered cluster.
///
/// Shows at most `limit` members, then a line counting the rest.
pub fn cluster_preview<S: MapSurface>(
    surface: &S,
    cluster: &Feature,
    limit: usize,
    offset: f64,
) -> Result<Option<PopupSpec>, SurfaceError> {
    let (Some(cluster_id), Some(position)) = (
        cluster.u64_property(PROP_CLUSTER_ID),
        cluster.point_coordinates(),
    ) else {
        return Ok(None);
    };

    let leaves = surface.cluster_leaves(PROVIDER_SOURCE, cluster_id, limit)?;
    let total = cluster
        .u64_property(PROP_POINT_COUNT)
        .map(|n| n as usize)
        .unwrap_or(leaves.len());

    let mut lines: Vec<String> = leaves
        .iter()
        .filter_map(|leaf| {
            let name = leaf.string_property(PROP_NAME)?;
            Some(match leaf.string_property(PROP_TYPE_ID) {
                Some(category) => format!("{} ({})", name, category),
                None => name,
            })
        })
        .collect();

    let shown = leaves.len().min(limit);
    if total > shown {
        lines.push(format!("{} more...", total - shown));
    }

    Ok(Some(PopupSpec::label(position, lines, CLUSTER_POPUP_CLASS, offset)))
}

/// Something the pointer can hover.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HoverTarget {
    Layer(String),
    Marker(MarkerHandle),
}

/// Hover popups, at most one per target.
#[derive(Debug, Default)]
pub struct HoverPopups {
    open: HashMap<HoverTarget, PopupHandle>,
}

impl HoverPopups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `spec` for `target`, replacing that target's previous popup.
    pub fn enter<S: MapSurface>(
        &mut self,
        surface: &mut S,
        target: HoverTarget,
        spec: &PopupSpec,
    ) -> Result<(), SurfaceError> {
        self.leave(surface, &target);
        let handle = surface.show_popup(spec)?;
        self.open.insert(target, handle);
        Ok(())
    }

    /// Hide the popup for `target`. Returns whether one was open.
    pub fn leave<S: MapSurface>(&mut self, surface: &mut S, target: &HoverTarget) -> bool {
        match self.open.remove(target) {
            Some(handle) => {
                surface.remove_popup(handle);
                true
            }
            None => false,
        }
    }

    /// Hide every popup.
    pub fn clear<S: MapSurface>(&mut self, surface: &mut S) -> usize {
        let count = self.open.len();
        for (_, handle) in self.open.drain() {
            surface.remove_popup(handle);
        }
        count
    }

    pub fn is_open(&self, target: &HoverTarget) -> bool {
        self.open.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{provider_feature, LngLat};
    use crate::model::Provider;
    use crate::provision::Provisioner;
    use crate::config::MapViewConfig;
    use crate::surface::{CameraCall, RecordingSurface};

    #[derive(Default)]
    struct Hooks {
        calls: Vec<String>,
    }

    impl StateHooks for Hooks {
        fn display_provider_information(&mut self, id: &ProviderId) {
            self.calls.push(format!("display:{}", id));
        }
        fn select_provider(&mut self, id: &ProviderId) {
            self.calls.push(format!("select:{}", id));
        }
        fn set_search_center_coordinates(&mut self, _: LngLat, id: &ProviderId, _: &str) {
            self.calls.push(format!("center:{}", id));
        }
        fn select_tab(&mut self, index: usize) {
            self.calls.push(format!("tab:{}", index));
        }
    }

    fn cluster(id: u64, count: u64) -> Feature {
        Feature::point(LngLat::new(-71.05, 42.35))
            .with_property(PROP_CLUSTER_ID, id)
            .with_property(PROP_POINT_COUNT, count)
    }

    fn surface_with_source() -> RecordingSurface {
        let mut surface = RecordingSurface::default();
        Provisioner::new(&MapViewConfig::default())
            .ensure_source(&mut surface)
            .unwrap();
        surface
    }

    #[test]
    fn test_target_expansion_zoom() {
        assert_eq!(target_expansion_zoom(9.0, 12.0), 12.0);
        assert_eq!(target_expansion_zoom(12.0, 10.0), 13.0);
        assert_eq!(target_expansion_zoom(12.0, 12.0), 13.0);
    }

    #[test]
    fn test_degenerate_cluster_click_goes_one_level_deeper() {
        let mut surface = surface_with_source();
        surface.set_zoom(12.0);
        surface.set_expansion_zoom(7, 10.0);
        surface.set_rendered_features(CLUSTER_TEXT_LAYER, vec![cluster(7, 2)]);

        assert!(handle_cluster_click(&mut surface, ScreenPoint::new(10.0, 10.0), &[]));

        match surface.camera_calls() {
            [CameraCall::Ease(ease)] => {
                assert_eq!(ease.zoom, 13.0);
                assert_eq!(ease.center, LngLat::new(-71.05, 42.35));
            }
            other => panic!("unexpected camera calls: {:?}", other),
        }
    }

    #[test]
    fn test_stale_cluster_aborts_silently() {
        let mut surface = surface_with_source();
        surface.set_rendered_features(CLUSTER_TEXT_LAYER, vec![cluster(99, 2)]);

        assert!(!handle_cluster_click(&mut surface, ScreenPoint::new(0.0, 0.0), &[]));
        assert!(surface.camera_calls().is_empty());
    }

    #[test]
    fn test_cluster_click_falls_back_to_event_features() {
        let mut surface = surface_with_source();
        surface.set_zoom(8.0);
        surface.set_expansion_zoom(3, 11.0);

        let ease =
            resolve_cluster_click(&surface, ScreenPoint::new(0.0, 0.0), &[cluster(3, 4)]).unwrap();
        assert_eq!(ease.zoom, 11.0);
    }

    #[test]
    fn test_point_click_plans() {
        let mut props = MapProps::new(LngLat::new(-71.0, 42.3));
        let id = ProviderId::new("p1");

        assert_eq!(
            plan_point_click(&props, &id),
            PointClick::Display { id: id.clone(), select: true }
        );

        props.highlighted_providers = vec![id.clone()];
        assert_eq!(
            plan_point_click(&props, &id),
            PointClick::Display { id: id.clone(), select: false }
        );

        props.detail_provider_id = Some(id.clone());
        assert_eq!(plan_point_click(&props, &id), PointClick::AlreadyDisplayed(id));
    }

    #[test]
    fn test_apply_point_click_hook_order() {
        let mut hooks = Hooks::default();
        let click = PointClick::Display {
            id: ProviderId::new("p1"),
            select: true,
        };

        assert!(apply_point_click(&mut hooks, &click));
        assert_eq!(hooks.calls, vec!["select:p1", "display:p1", "tab:1"]);

        let mut hooks = Hooks::default();
        assert!(!apply_point_click(&mut hooks, &PointClick::AlreadyDisplayed(ProviderId::new("p1"))));
        assert!(hooks.calls.is_empty());
    }

    #[test]
    fn test_clicked_provider_reads_topmost() {
        let a = provider_feature(&Provider::new("a", "legal", "A", LngLat::new(0.0, 0.0)), false);
        let b = provider_feature(&Provider::new("b", "legal", "B", LngLat::new(0.0, 0.0)), false);
        assert_eq!(clicked_provider(&[a, b]), Some(ProviderId::new("a")));
        assert_eq!(clicked_provider(&[]), None);
    }

    #[test]
    fn test_hover_keeps_one_popup_per_target() {
        let mut surface = RecordingSurface::default();
        let mut popups = HoverPopups::new();
        let feature = provider_feature(
            &Provider::new("a", "legal", "Legal Aid", LngLat::new(-71.0, 42.3)),
            false,
        );
        let spec = name_popup(&feature, 20.0).unwrap();
        let legal = HoverTarget::Layer("legal".to_string());

        popups.enter(&mut surface, legal.clone(), &spec).unwrap();
        popups.enter(&mut surface, legal.clone(), &spec).unwrap();
        popups
            .enter(&mut surface, HoverTarget::Layer("food".to_string()), &spec)
            .unwrap();
        assert_eq!(surface.popup_count(), 2);
        assert!(popups.is_open(&legal));

        assert!(popups.leave(&mut surface, &legal));
        assert!(!popups.is_open(&legal));
        assert!(!popups.leave(&mut surface, &legal));
        assert_eq!(surface.popup_count(), 1);

        assert_eq!(popups.clear(&mut surface), 1);
        assert_eq!(surface.popup_count(), 0);
    }

    #[test]
    fn test_name_popup_content() {
        let feature = provider_feature(
            &Provider::new("a", "legal", "Legal Aid", LngLat::new(-71.0, 42.3)),
            false,
        );
        let spec = name_popup(&feature, 20.0).unwrap();
        assert_eq!(spec.lines, vec!["Legal Aid"]);
        assert_eq!(spec.class_name, NAME_POPUP_CLASS);
        assert_eq!(spec.offset, 20.0);
        assert!(!spec.close_button && !spec.close_on_click);
    }

    #[test]
    fn test_cluster_preview_truncates_with_remainder() {
        let mut surface = surface_with_source();
        let leaves: Vec<Feature> = (0..12)
            .map(|i| {
                provider_feature(
                    &Provider::new(format!("p{}", i), "legal", format!("Provider {}", i), LngLat::new(0.0, 0.0)),
                    false,
                )
            })
            .collect();
        surface.set_cluster_leaves(5, leaves);

        let spec = cluster_preview(&surface, &cluster(5, 12), 9, 20.0)
            .unwrap()
            .unwrap();

        assert_eq!(spec.lines.len(), 10);
        assert_eq!(spec.lines[0], "Provider 0 (legal)");
        assert_eq!(spec.lines[9], "3 more...");
        assert_eq!(spec.class_name, CLUSTER_POPUP_CLASS);
    }

    #[test]
    fn test_cluster_preview_small_cluster_has_no_remainder() {
        let mut surface = surface_with_source();
        let leaves = vec![provider_feature(
            &Provider::new("p0", "food", "Pantry", LngLat::new(0.0, 0.0)),
            false,
        )];
        surface.set_cluster_leaves(5, leaves);

        let spec = cluster_preview(&surface, &cluster(5, 1), 9, 20.0)
            .unwrap()
            .unwrap();
        assert_eq!(spec.lines, vec!["Pantry (food)"]);
    }

    #[test]
    fn test_cluster_preview_stale_cluster_errors() {
        let surface = surface_with_source();
        assert!(matches!(
            cluster_preview(&surface, &cluster(42, 3), 9, 20.0),
            Err(SurfaceError::StaleCluster(42))
        ));
    }
}
