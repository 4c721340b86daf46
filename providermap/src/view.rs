//! Map view synchronization driver.
//!
//! [`MapView`] owns the rendering surface and every registry for its
//! lifetime. Each props update runs one reconciliation cycle:
//!
//! ```text
//! update(props)
//!   │  (deferred until on_load)
//!   ├─ a. push features with recomputed highlight flags
//!   ├─ b. ensure category layers and the highlight layer
//!   ├─ c. distance overlay (guarded)
//!   ├─ d. camera intent (first match wins)
//!   └─ e. reconcile selection markers
//! ```
//!
//! A failing sub-step is logged and recorded in the [`CycleReport`]; the
//! remaining sub-steps still run. Nothing is retried; the next cycle
//! re-derives the full desired state.

use std::fmt::Display;

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use crate::camera::{CameraController, CameraIntent, ViewSnapshot};
use crate::config::MapViewConfig;
use crate::distance::DistanceIndicator;
use crate::error::MapError;
use crate::geo::{providers_by_id, providers_to_features, Feature, ScreenPoint};
use crate::icons::IconSet;
use crate::interaction::{
    apply_point_click, clicked_provider, cluster_preview, handle_cluster_click, name_popup,
    plan_point_click, HoverPopups, HoverTarget, NAME_POPUP_CLASS,
};
use crate::markers::{MarkerKey, MarkerRegistry};
use crate::model::{MapProps, Provider, ProviderId, StateHooks};
use crate::provision::{LayerRole, Provisioner};
use crate::surface::{
    LayerEventKind, MapEvent, MapSurface, MarkerEventKind, MarkerHandle, PopupSpec,
};
use crate::telemetry::{CycleReport, SyncMetrics, TelemetrySnapshot};

/// What is left after [`MapView::unmount`].
#[derive(Debug)]
pub struct Teardown<S, H> {
    /// The released surface.
    pub surface: S,
    pub hooks: H,
    pub telemetry: TelemetrySnapshot,
}

/// A mounted map view bound to one surface.
pub struct MapView<S: MapSurface, H: StateHooks> {
    surface: S,
    hooks: H,
    config: MapViewConfig,
    props: MapProps,
    loaded: bool,
    provisioner: Provisioner,
    markers: MarkerRegistry,
    popups: HoverPopups,
    distance: DistanceIndicator,
    camera: CameraController,
    metrics: SyncMetrics,
}

impl<S: MapSurface, H: StateHooks> MapView<S, H> {
    /// Bind a view to a surface that has started (but not finished) loading.
    ///
    /// No source, layer, or marker is touched until [`MapView::on_load`].
    pub fn mount(surface: S, hooks: H, props: MapProps, config: MapViewConfig) -> Result<Self, MapError> {
        config.validate()?;
        info!(
            center = %props.search.map_center,
            zoom = config.initial_zoom,
            style = %config.style_url,
            "Map view mounted"
        );

        Ok(Self {
            provisioner: Provisioner::new(&config),
            distance: DistanceIndicator::new(&config, &props),
            camera: CameraController::new(&config),
            surface,
            hooks,
            config,
            props,
            loaded: false,
            markers: MarkerRegistry::new(),
            popups: HoverPopups::new(),
            metrics: SyncMetrics::new(),
        })
    }

    /// Finish initialization once the surface signals it has loaded.
    ///
    /// Creates the static sources and layers, registers every icon, then runs
    /// the first cycle against the current props. Any icon failure is fatal
    /// and leaves the view unloaded.
    pub async fn on_load(&mut self, icons: &IconSet) -> Result<CycleReport, MapError> {
        if self.loaded {
            return Err(MapError::AlreadyLoaded);
        }

        self.provisioner.ensure_source(&mut self.surface)?;
        let mut layers = self.provisioner.ensure_distance_layers(&mut self.surface)?;
        layers += self.provisioner.ensure_cluster_layers(&mut self.surface)?;
        self.metrics.record_layers_created(layers);

        let surface = &self.surface;
        let images = try_join_all(icons.iter().map(|icon| async move {
            surface
                .load_image(&icon.url)
                .await
                .map(|image| (icon.name.clone(), image))
                .map_err(|source| MapError::IconLoad {
                    name: icon.name.clone(),
                    source,
                })
        }))
        .await
        .map_err(|e| {
            error!(error = %e, "Icon loading failed");
            e
        })?;

        for (name, image) in images {
            self.surface
                .add_image(&name, image)
                .map_err(|source| MapError::IconLoad {
                    name: name.clone(),
                    source,
                })?;
        }

        self.loaded = true;
        info!(icons = icons.len(), layers, "Map loaded");

        let snapshot = ViewSnapshot::of(&self.props);
        Ok(self.run_cycle(&snapshot))
    }

    /// Accept new props and reconcile the surface with them.
    ///
    /// Before load the props are stored and the cycle is deferred.
    pub fn update(&mut self, props: MapProps) -> CycleReport {
        let previous = std::mem::replace(&mut self.props, props);
        if !self.loaded {
            debug!("Cycle deferred until load");
            let report = CycleReport::deferred();
            self.metrics.record_cycle(&report);
            return report;
        }
        self.run_cycle(&ViewSnapshot::of(&previous))
    }

    /// Re-run a cycle against the current props.
    ///
    /// Nothing is considered changed, so the camera stays put; failed
    /// sub-steps from earlier cycles get another attempt.
    pub fn refresh(&mut self) -> Result<CycleReport, MapError> {
        if !self.loaded {
            return Err(MapError::NotLoaded);
        }
        let snapshot = ViewSnapshot::of(&self.props);
        Ok(self.run_cycle(&snapshot))
    }

    /// Route one user input event. Returns whether it had an effect.
    pub fn handle_event(&mut self, event: MapEvent) -> bool {
        if !self.loaded {
            debug!(?event, "Event before load ignored");
            return false;
        }
        self.metrics.event_handled();

        match event {
            MapEvent::Layer {
                layer,
                kind,
                point,
                features,
            } => self.handle_layer_event(&layer, kind, point, &features),
            MapEvent::Marker { marker, kind } => self.handle_marker_event(marker, kind),
        }
    }

    /// Remove every marker and popup, then release the surface.
    pub fn unmount(mut self) -> Teardown<S, H> {
        let markers = self.markers.clear(&mut self.surface);
        let popups = self.popups.clear(&mut self.surface);
        self.surface.remove();
        self.metrics.record_markers_removed(markers);

        info!(markers, popups, "Map view unmounted");
        Teardown {
            surface: self.surface,
            hooks: self.hooks,
            telemetry: self.metrics.snapshot(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable surface access for the host (resizes, viewport changes).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn props(&self) -> &MapProps {
        &self.props
    }

    pub fn config(&self) -> &MapViewConfig {
        &self.config
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    fn run_cycle(&mut self, prev: &ViewSnapshot) -> CycleReport {
        let mut report = CycleReport {
            ran: true,
            ..CycleReport::default()
        };

        // a. features
        let highlighted = self.props.highlighted_set();
        let features = providers_to_features(&self.props.visible_providers, &highlighted);
        match self.provisioner.push_features(&mut self.surface, &features) {
            Ok(()) => report.features_pushed = features.len(),
            Err(e) => recovered(&mut report, "push features", e),
        }

        // b. layers
        for category in &self.props.loaded_category_ids {
            match self.provisioner.ensure_layer(&mut self.surface, category) {
                Ok(created) => report.layers_created += usize::from(created),
                Err(e) => recovered(&mut report, &format!("layer {}", category), e),
            }
        }
        match self.provisioner.ensure_highlight_layer(&mut self.surface) {
            Ok(created) => report.layers_created += usize::from(created),
            Err(e) => recovered(&mut report, "highlight layer", e),
        }

        // c. distance overlay
        match self.distance.sync(
            &mut self.surface,
            &mut self.provisioner,
            &mut self.markers,
            &self.props,
        ) {
            Ok(Some(applied)) => {
                report.overlay_regenerated = true;
                report.markers_added += applied.markers_added;
                report.markers_removed += applied.markers_removed;
            }
            Ok(None) => {}
            Err(e) => recovered(&mut report, "distance overlay", e),
        }

        // d. camera
        let index = providers_by_id(&self.props.visible_providers);
        let curr = ViewSnapshot::of(&self.props);
        let intent = self.camera.decide(&self.surface, prev, &curr, &index);
        let moved = self.camera.execute(
            &mut self.surface,
            &intent,
            &self.props.highlighted_providers,
            &index,
        );
        report.camera = Some(if moved { intent } else { CameraIntent::None });

        // e. selection markers
        let diff = self.markers.reconcile_selection(
            &mut self.surface,
            &self.props.highlighted_providers,
            &index,
        );
        report.markers_added += diff.added.len();
        report.markers_removed += diff.removed.len();
        // A removed element never sends MouseLeave
        for (_, handle) in &diff.removed {
            self.popups.leave(&mut self.surface, &HoverTarget::Marker(*handle));
        }
        for (id, e) in diff.failed {
            report.errors.push(format!("selection marker {}: {}", id, e));
        }

        debug!(
            features = report.features_pushed,
            layers = report.layers_created,
            overlay = report.overlay_regenerated,
            camera = ?report.camera,
            markers_added = report.markers_added,
            markers_removed = report.markers_removed,
            errors = report.errors.len(),
            "Cycle complete"
        );
        self.metrics.record_cycle(&report);
        report
    }

    fn handle_layer_event(
        &mut self,
        layer: &str,
        kind: LayerEventKind,
        point: ScreenPoint,
        features: &[Feature],
    ) -> bool {
        if !self.provisioner.handles(layer, kind) {
            debug!(layer, ?kind, "Event on unsubscribed layer ignored");
            return false;
        }
        let target = HoverTarget::Layer(layer.to_string());

        match (self.provisioner.role(layer), kind) {
            (Some(LayerRole::Cluster), LayerEventKind::Click) => {
                let moved = handle_cluster_click(&mut self.surface, point, features);
                if moved {
                    self.metrics.camera_moved();
                }
                moved
            }
            (Some(LayerRole::Cluster), LayerEventKind::MouseEnter) => {
                let Some(cluster) = features.first() else {
                    return false;
                };
                match cluster_preview(
                    &self.surface,
                    cluster,
                    self.config.cluster_preview_limit,
                    self.config.hover_popup_offset,
                ) {
                    Ok(Some(spec)) => self.show_popup(target, &spec),
                    Ok(None) => false,
                    Err(e) => {
                        debug!(layer, error = %e, "Cluster preview unavailable");
                        false
                    }
                }
            }
            (Some(LayerRole::Category), LayerEventKind::Click) => match clicked_provider(features) {
                Some(id) => self.click_provider(&id),
                None => false,
            },
            (Some(LayerRole::Category), LayerEventKind::MouseEnter) => {
                match features
                    .first()
                    .and_then(|f| name_popup(f, self.config.hover_popup_offset))
                {
                    Some(spec) => self.show_popup(target, &spec),
                    None => false,
                }
            }
            (_, LayerEventKind::MouseLeave) => self.popups.leave(&mut self.surface, &target),
            _ => false,
        }
    }

    fn handle_marker_event(&mut self, marker: MarkerHandle, kind: MarkerEventKind) -> bool {
        let Some(MarkerKey::Selection(id)) = self.markers.key_for(marker).cloned() else {
            return false;
        };
        let target = HoverTarget::Marker(marker);

        match kind {
            MarkerEventKind::Click => self.click_provider(&id),
            MarkerEventKind::DoubleClick => match visible_provider(&self.props, &id) {
                Some(provider) => {
                    debug!(provider = %id, "Searching around provider");
                    self.hooks.set_search_center_coordinates(
                        provider.coordinates,
                        &provider.id,
                        &provider.name,
                    );
                    true
                }
                None => false,
            },
            MarkerEventKind::MouseEnter => {
                let position = self.markers.get(&MarkerKey::Selection(id.clone())).map(|m| m.position);
                let spec = match (position, visible_provider(&self.props, &id)) {
                    (Some(position), Some(provider)) => Some(PopupSpec::label(
                        position,
                        vec![provider.name.clone()],
                        NAME_POPUP_CLASS,
                        self.config.hover_popup_offset,
                    )),
                    _ => None,
                };
                match spec {
                    Some(spec) => self.show_popup(target, &spec),
                    None => false,
                }
            }
            MarkerEventKind::MouseLeave => self.popups.leave(&mut self.surface, &target),
        }
    }

    fn click_provider(&mut self, id: &ProviderId) -> bool {
        let click = plan_point_click(&self.props, id);
        apply_point_click(&mut self.hooks, &click)
    }

    fn show_popup(&mut self, target: HoverTarget, spec: &PopupSpec) -> bool {
        match self.popups.enter(&mut self.surface, target, spec) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Popup rejected");
                self.metrics.error_recovered();
                false
            }
        }
    }
}

fn visible_provider<'a>(props: &'a MapProps, id: &ProviderId) -> Option<&'a Provider> {
    props.visible_providers.iter().find(|p| &p.id == id)
}

fn recovered(report: &mut CycleReport, step: &str, err: impl Display) {
    warn!(step, error = %err, "Cycle step failed");
    report.errors.push(format!("{}: {}", step, err));
}
