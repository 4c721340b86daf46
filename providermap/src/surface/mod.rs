//! Rendering surface capability contract
//!
//! The map library that actually draws tiles, layers, and overlays is an
//! external collaborator. This module pins down the imperative capabilities
//! the view needs from it and nothing more. The surface keeps no diff of its
//! own; [`crate::view::MapView`] is the only diffing layer.
//!
//! # Event delivery
//!
//! Native callbacks cannot call back into the view while it is borrowed, so
//! the host forwards user input as [`MapEvent`] values into
//! [`crate::view::MapView::handle_event`]. [`MapSurface::subscribe`] tells
//! the host which layer events to forward.
//!
//! # Asynchrony
//!
//! Only icon loading is awaited. Camera transitions are fire-and-forget: a
//! newer call supersedes a running animation and the surface is trusted to
//! coalesce.

mod recording;
mod spec;

pub use recording::{CameraCall, RecordingSurface};
pub use spec::{
    EaseOptions, FilterExpr, FitOptions, FlyOptions, LayerSpec, LayerStyle, MarkerElement,
    MarkerHandle, MarkerSpec, PopupHandle, PopupSpec, SourceSpec, SymbolLayout, TextPaint,
};

use futures::future::LocalBoxFuture;
use image::RgbaImage;
use thiserror::Error;

use crate::geo::{Feature, FeatureCollection, GeoBounds, LngLat, ScreenPoint};

/// Errors reported by a rendering surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    /// Referenced source does not exist.
    #[error("Source not found: {0}")]
    MissingSource(String),

    /// Referenced layer does not exist.
    #[error("Layer not found: {0}")]
    MissingLayer(String),

    /// Cluster id no longer present in the source.
    #[error("Cluster {0} no longer exists")]
    StaleCluster(u64),

    /// Icon image could not be fetched or decoded.
    #[error("Failed to load image {url}: {reason}")]
    ImageLoad { url: String, reason: String },

    /// Surface refused the operation.
    #[error("Surface rejected operation: {0}")]
    Rejected(String),
}

/// Layer-scoped event kinds a host can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerEventKind {
    Click,
    MouseEnter,
    MouseLeave,
}

/// Marker-scoped event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerEventKind {
    Click,
    DoubleClick,
    MouseEnter,
    MouseLeave,
}

/// User input delivered by the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Input on a layer the view subscribed to.
    Layer {
        layer: String,
        kind: LayerEventKind,
        point: ScreenPoint,
        /// Features under the pointer, topmost first.
        features: Vec<Feature>,
    },
    /// Input on a marker element.
    Marker {
        marker: MarkerHandle,
        kind: MarkerEventKind,
    },
}

/// Imperative map rendering surface.
///
/// Implementations wrap a concrete map library. All methods run on the UI
/// thread; nothing here is `Send`.
pub trait MapSurface {
    /// Whether a source with this id exists.
    fn has_source(&self, id: &str) -> bool;

    /// Create a source with empty data.
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError>;

    /// Replace the source's whole feature collection.
    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError>;

    /// Whether a layer with this id exists.
    fn has_layer(&self, id: &str) -> bool;

    /// Add a layer on top of existing layers.
    fn add_layer(&mut self, layer: &LayerSpec) -> Result<(), SurfaceError>;

    /// Start forwarding `kind` events on `layer` as [`MapEvent::Layer`].
    fn subscribe(&mut self, layer: &str, kind: LayerEventKind) -> Result<(), SurfaceError>;

    /// Features rendered at a screen point, restricted to `layers`.
    fn query_rendered_features(&self, point: ScreenPoint, layers: &[&str]) -> Vec<Feature>;

    /// Zoom level at which the cluster first splits.
    fn cluster_expansion_zoom(&self, source: &str, cluster_id: u64) -> Result<f64, SurfaceError>;

    /// Up to `limit` member points of a cluster.
    fn cluster_leaves(
        &self,
        source: &str,
        cluster_id: u64,
        limit: usize,
    ) -> Result<Vec<Feature>, SurfaceError>;

    /// Current (fractional) zoom level.
    fn zoom(&self) -> f64;

    /// Canvas size in pixels as `(width, height)`.
    fn canvas_size(&self) -> (f64, f64);

    /// Height of the physical screen in pixels.
    fn screen_height(&self) -> f64;

    /// Geographic position under a canvas pixel.
    fn unproject(&self, point: ScreenPoint) -> LngLat;

    fn ease_to(&mut self, options: &EaseOptions);

    fn fly_to(&mut self, options: &FlyOptions);

    fn fit_bounds(&mut self, bounds: &GeoBounds, options: &FitOptions);

    /// Place a marker; the handle is the only way to remove it later.
    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, SurfaceError>;

    /// Remove a marker. Unknown handles are ignored.
    fn remove_marker(&mut self, handle: MarkerHandle);

    fn show_popup(&mut self, spec: &PopupSpec) -> Result<PopupHandle, SurfaceError>;

    /// Remove a popup. Unknown handles are ignored.
    fn remove_popup(&mut self, handle: PopupHandle);

    /// Fetch and decode an image.
    fn load_image<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<RgbaImage, SurfaceError>>;

    /// Register a decoded image under `name` for use as an icon.
    fn add_image(&mut self, name: &str, image: RgbaImage) -> Result<(), SurfaceError>;

    /// Release the surface and its native resources.
    fn remove(&mut self);
}
