//! Headless surface that records every imperative call.
//!
//! Useful for hosts that want to inspect what the view would draw without a
//! GPU, and used throughout the test suite. Camera calls are recorded, not
//! simulated: zoom and visible bounds only change through the setters.

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::{self, LocalBoxFuture};
use image::{Rgba, RgbaImage};

use super::{
    EaseOptions, FitOptions, FlyOptions, LayerEventKind, LayerSpec, MapSurface, MarkerHandle,
    MarkerSpec, PopupHandle, PopupSpec, SourceSpec, SurfaceError,
};
use crate::geo::{Feature, FeatureCollection, GeoBounds, LngLat, ScreenPoint};

/// A recorded camera transition.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraCall {
    Ease(EaseOptions),
    Fly(FlyOptions),
    Fit(GeoBounds, FitOptions),
}

/// Recording implementation of [`MapSurface`].
#[derive(Debug)]
pub struct RecordingSurface {
    sources: HashMap<String, (SourceSpec, FeatureCollection)>,
    set_data_calls: HashMap<String, usize>,
    layers: Vec<LayerSpec>,
    subscriptions: Vec<(String, LayerEventKind)>,
    camera_calls: Vec<CameraCall>,
    markers: BTreeMap<MarkerHandle, MarkerSpec>,
    markers_added: usize,
    markers_removed: usize,
    popups: BTreeMap<PopupHandle, PopupSpec>,
    images: HashMap<String, RgbaImage>,
    failing_images: HashSet<String>,
    rendered: HashMap<String, Vec<Feature>>,
    expansion_zooms: HashMap<u64, f64>,
    cluster_leaves: HashMap<u64, Vec<Feature>>,
    reject_markers: bool,
    next_handle: u64,
    zoom: f64,
    canvas: (f64, f64),
    screen_height: f64,
    view: GeoBounds,
    removed: bool,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        // Greater Boston on a 1600x900 canvas
        Self::new(GeoBounds::new(42.0, 42.6, -71.6, -70.6), (1600.0, 900.0))
    }
}

impl RecordingSurface {
    /// Create a surface showing `view` on a canvas of `canvas` pixels.
    pub fn new(view: GeoBounds, canvas: (f64, f64)) -> Self {
        Self {
            sources: HashMap::new(),
            set_data_calls: HashMap::new(),
            layers: Vec::new(),
            subscriptions: Vec::new(),
            camera_calls: Vec::new(),
            markers: BTreeMap::new(),
            markers_added: 0,
            markers_removed: 0,
            popups: BTreeMap::new(),
            images: HashMap::new(),
            failing_images: HashSet::new(),
            rendered: HashMap::new(),
            expansion_zooms: HashMap::new(),
            cluster_leaves: HashMap::new(),
            reject_markers: false,
            next_handle: 1,
            zoom: 11.0,
            canvas,
            screen_height: 1080.0,
            view,
            removed: false,
        }
    }

    // ---- scripting -------------------------------------------------------

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Change the geographic area spanned by the canvas.
    pub fn set_view(&mut self, view: GeoBounds) {
        self.view = view;
    }

    pub fn set_screen_height(&mut self, px: f64) {
        self.screen_height = px;
    }

    /// Features returned by `query_rendered_features` for `layer`.
    pub fn set_rendered_features(&mut self, layer: &str, features: Vec<Feature>) {
        self.rendered.insert(layer.to_string(), features);
    }

    pub fn set_expansion_zoom(&mut self, cluster_id: u64, zoom: f64) {
        self.expansion_zooms.insert(cluster_id, zoom);
    }

    pub fn set_cluster_leaves(&mut self, cluster_id: u64, leaves: Vec<Feature>) {
        self.cluster_leaves.insert(cluster_id, leaves);
    }

    /// Make `load_image` fail for this url.
    pub fn fail_image(&mut self, url: &str) {
        self.failing_images.insert(url.to_string());
    }

    /// Make `add_marker` fail until reset.
    pub fn reject_markers(&mut self, reject: bool) {
        self.reject_markers = reject;
    }

    // ---- inspection ------------------------------------------------------

    pub fn source_data(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id).map(|(_, data)| data)
    }

    pub fn source_spec(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id).map(|(spec, _)| spec)
    }

    /// Number of `set_source_data` calls made for a source.
    pub fn set_data_count(&self, id: &str) -> usize {
        self.set_data_calls.get(id).copied().unwrap_or(0)
    }

    /// Layer ids in draw order.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Number of subscriptions registered for `kind` events on `layer`.
    pub fn subscription_count(&self, layer: &str, kind: LayerEventKind) -> usize {
        self.subscriptions
            .iter()
            .filter(|(l, k)| l == layer && *k == kind)
            .count()
    }

    pub fn camera_calls(&self) -> &[CameraCall] {
        &self.camera_calls
    }

    pub fn clear_camera_calls(&mut self) {
        self.camera_calls.clear();
    }

    pub fn fit_count(&self) -> usize {
        self.count_camera(|c| matches!(c, CameraCall::Fit(..)))
    }

    pub fn fly_count(&self) -> usize {
        self.count_camera(|c| matches!(c, CameraCall::Fly(_)))
    }

    pub fn ease_count(&self) -> usize {
        self.count_camera(|c| matches!(c, CameraCall::Ease(_)))
    }

    fn count_camera(&self, pred: impl Fn(&CameraCall) -> bool) -> usize {
        self.camera_calls.iter().filter(|c| pred(c)).count()
    }

    /// Markers currently on the map.
    pub fn markers(&self) -> impl Iterator<Item = (&MarkerHandle, &MarkerSpec)> {
        self.markers.iter()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&MarkerSpec> {
        self.markers.get(&handle)
    }

    pub fn live_marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Lifetime totals as `(added, removed)`.
    pub fn marker_totals(&self) -> (usize, usize) {
        (self.markers_added, self.markers_removed)
    }

    pub fn popups(&self) -> impl Iterator<Item = &PopupSpec> {
        self.popups.values()
    }

    pub fn popup_count(&self) -> usize {
        self.popups.len()
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl MapSurface for RecordingSurface {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::Rejected(format!("source {} already exists", id)));
        }
        self.sources
            .insert(id.to_string(), (spec.clone(), FeatureCollection::empty()));
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let (_, current) = self
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::MissingSource(id.to_string()))?;
        *current = data.clone();
        *self.set_data_calls.entry(id.to_string()).or_default() += 1;
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn add_layer(&mut self, layer: &LayerSpec) -> Result<(), SurfaceError> {
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::Rejected(format!(
                "layer {} already exists",
                layer.id
            )));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::MissingSource(layer.source.clone()));
        }
        self.layers.push(layer.clone());
        Ok(())
    }

    fn subscribe(&mut self, layer: &str, kind: LayerEventKind) -> Result<(), SurfaceError> {
        if !self.has_layer(layer) {
            return Err(SurfaceError::MissingLayer(layer.to_string()));
        }
        self.subscriptions.push((layer.to_string(), kind));
        Ok(())
    }

    fn query_rendered_features(&self, _point: ScreenPoint, layers: &[&str]) -> Vec<Feature> {
        layers
            .iter()
            .filter_map(|l| self.rendered.get(*l))
            .flatten()
            .cloned()
            .collect()
    }

    fn cluster_expansion_zoom(&self, source: &str, cluster_id: u64) -> Result<f64, SurfaceError> {
        if !self.sources.contains_key(source) {
            return Err(SurfaceError::MissingSource(source.to_string()));
        }
        self.expansion_zooms
            .get(&cluster_id)
            .copied()
            .ok_or(SurfaceError::StaleCluster(cluster_id))
    }

    fn cluster_leaves(
        &self,
        source: &str,
        cluster_id: u64,
        limit: usize,
    ) -> Result<Vec<Feature>, SurfaceError> {
        if !self.sources.contains_key(source) {
            return Err(SurfaceError::MissingSource(source.to_string()));
        }
        self.cluster_leaves
            .get(&cluster_id)
            .map(|leaves| leaves.iter().take(limit).cloned().collect())
            .ok_or(SurfaceError::StaleCluster(cluster_id))
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn canvas_size(&self) -> (f64, f64) {
        self.canvas
    }

    fn screen_height(&self) -> f64 {
        self.screen_height
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        // Linear interpolation is close enough at city scale
        let (width, height) = self.canvas;
        LngLat::new(
            self.view.min_lon + point.x / width * self.view.width(),
            self.view.max_lat - point.y / height * self.view.height(),
        )
    }

    fn ease_to(&mut self, options: &EaseOptions) {
        self.camera_calls.push(CameraCall::Ease(*options));
    }

    fn fly_to(&mut self, options: &FlyOptions) {
        self.camera_calls.push(CameraCall::Fly(*options));
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds, options: &FitOptions) {
        self.camera_calls.push(CameraCall::Fit(*bounds, *options));
    }

    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, SurfaceError> {
        if self.reject_markers {
            return Err(SurfaceError::Rejected("markers disabled".to_string()));
        }
        let handle = MarkerHandle(self.next_handle());
        self.markers.insert(handle, spec.clone());
        self.markers_added += 1;
        Ok(handle)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle).is_some() {
            self.markers_removed += 1;
        }
    }

    fn show_popup(&mut self, spec: &PopupSpec) -> Result<PopupHandle, SurfaceError> {
        let handle = PopupHandle(self.next_handle());
        self.popups.insert(handle, spec.clone());
        Ok(handle)
    }

    fn remove_popup(&mut self, handle: PopupHandle) {
        self.popups.remove(&handle);
    }

    fn load_image<'a>(
        &'a self,
        url: &'a str,
    ) -> LocalBoxFuture<'a, Result<RgbaImage, SurfaceError>> {
        let result = if self.failing_images.contains(url) {
            Err(SurfaceError::ImageLoad {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
        } else {
            Ok(RgbaImage::from_pixel(1, 1, Rgba([213, 97, 181, 255])))
        };
        Box::pin(future::ready(result))
    }

    fn add_image(&mut self, name: &str, image: RgbaImage) -> Result<(), SurfaceError> {
        self.images.insert(name.to_string(), image);
        Ok(())
    }

    fn remove(&mut self) {
        self.removed = true;
        self.markers.clear();
        self.popups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{LayerStyle, SymbolLayout};

    fn symbol_layer(id: &str, source: &str) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            source: source.to_string(),
            style: LayerStyle::Symbol {
                layout: SymbolLayout::icon("x", 1.0),
                paint: None,
            },
            filter: None,
        }
    }

    #[test]
    fn test_layer_requires_source() {
        let mut surface = RecordingSurface::default();
        let err = surface.add_layer(&symbol_layer("a", "missing")).unwrap_err();
        assert_eq!(err, SurfaceError::MissingSource("missing".to_string()));
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        let mut surface = RecordingSurface::default();
        surface.add_source("s", &SourceSpec::plain()).unwrap();
        surface.add_layer(&symbol_layer("a", "s")).unwrap();

        assert!(surface.add_layer(&symbol_layer("a", "s")).is_err());
        assert_eq!(surface.layer_ids(), vec!["a"]);
    }

    #[test]
    fn test_unproject_corners_span_view() {
        let surface = RecordingSurface::new(GeoBounds::new(40.0, 41.0, -72.0, -70.0), (200.0, 100.0));

        assert_eq!(surface.unproject(ScreenPoint::new(0.0, 0.0)), LngLat::new(-72.0, 41.0));
        assert_eq!(surface.unproject(ScreenPoint::new(200.0, 100.0)), LngLat::new(-70.0, 40.0));
        assert_eq!(surface.unproject(ScreenPoint::new(100.0, 50.0)), LngLat::new(-71.0, 40.5));
    }

    #[test]
    fn test_marker_totals_track_removals_once() {
        let mut surface = RecordingSurface::default();
        let spec = MarkerSpec {
            position: LngLat::new(0.0, 0.0),
            element: crate::surface::MarkerElement::CenterPin,
        };
        let handle = surface.add_marker(&spec).unwrap();

        surface.remove_marker(handle);
        surface.remove_marker(handle);

        assert_eq!(surface.marker_totals(), (1, 1));
        assert_eq!(surface.live_marker_count(), 0);
    }
}
