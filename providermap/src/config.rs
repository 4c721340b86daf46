//! Map view configuration.
//!
//! `MapViewConfig` gathers every tunable the view uses: clustering
//! thresholds, camera timings, the UI padding reserved for the provider list,
//! and distance ring styling. Defaults match the production map; hosts
//! override individual fields with the `with_*` builders or from JSON.

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::geo::Padding;

/// Highest zoom at which points are still clustered.
pub const DEFAULT_CLUSTER_MAX_ZOOM: f64 = 14.0;

/// Lowest zoom at which individual provider icons render.
///
/// Also the maximum zoom for fit-to-bounds and the zoom used when flying to
/// a single provider.
pub const DEFAULT_UNCLUSTERED_MIN_ZOOM: f64 = 15.0;

/// Standard distance filter options in miles.
pub const DEFAULT_STANDARD_DISTANCES: [f64; 5] = [1.0, 3.0, 5.0, 10.0, 15.0];

/// Configuration for a [`crate::view::MapView`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapViewConfig {
    /// Base map style URL handed to the surface at creation.
    pub style_url: String,

    /// Zoom level at mount.
    pub initial_zoom: f64,

    /// Highest zoom at which points cluster.
    pub cluster_max_zoom: f64,

    /// Lowest zoom at which individual icons render.
    pub unclustered_min_zoom: f64,

    /// Cluster radius in pixels.
    pub cluster_radius: u32,

    /// Insets kept clear when fitting or testing visibility.
    pub fit_padding: Padding,

    /// Duration of fit-to-bounds animations in milliseconds.
    pub fit_duration_ms: u64,

    /// Fly-to animation speed (1.0 is the surface default).
    pub fly_speed: f64,

    /// Angular resolution of distance rings.
    pub circle_steps: usize,

    /// Radii drawn when no distance filter is active, in miles.
    pub standard_distances: Vec<f64>,

    /// Radius used to pick a zoom when a search has no distance filter.
    pub default_search_radius: f64,

    /// Pixel offset of the hover name popup.
    pub hover_popup_offset: f64,

    /// Maximum providers listed in a cluster preview popup.
    pub cluster_preview_limit: usize,

    /// Fill of inner distance rings.
    pub inner_ring_color: String,

    /// Fill of the outermost distance ring.
    pub outer_ring_color: String,

    /// Stroke colour of every distance ring.
    pub ring_stroke_color: String,

    /// Stroke width of every distance ring.
    pub ring_stroke_width: f64,

    /// Icon scale for provider symbols.
    pub icon_size: f64,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            style_url: "mapbox://styles/refugeeswelcome/cjxmgxala1t5b1dtea37lbi2p".to_string(),
            initial_zoom: 11.0,
            cluster_max_zoom: DEFAULT_CLUSTER_MAX_ZOOM,
            unclustered_min_zoom: DEFAULT_UNCLUSTERED_MIN_ZOOM,
            cluster_radius: 50,
            fit_padding: Padding::default(),
            fit_duration_ms: 2000,
            fly_speed: 0.5,
            circle_steps: 100,
            standard_distances: DEFAULT_STANDARD_DISTANCES.to_vec(),
            default_search_radius: 1.5,
            hover_popup_offset: 20.0,
            cluster_preview_limit: 9,
            inner_ring_color: "hsla(317, 100%, 84%, .1)".to_string(),
            outer_ring_color: "hsla(317, 100%, 84%, .15)".to_string(),
            ring_stroke_color: "#D561B5".to_string(),
            ring_stroke_width: 2.0,
            icon_size: 0.4,
        }
    }
}

impl MapViewConfig {
    /// Parse a (possibly partial) JSON override of the defaults.
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let config: Self = serde_json::from_str(json).map_err(|e| MapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the view cannot work with.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.cluster_max_zoom >= self.unclustered_min_zoom {
            return Err(MapError::Config(format!(
                "cluster_max_zoom ({}) must be below unclustered_min_zoom ({})",
                self.cluster_max_zoom, self.unclustered_min_zoom
            )));
        }
        if self.circle_steps < 3 {
            return Err(MapError::Config(format!(
                "circle_steps must be at least 3, got {}",
                self.circle_steps
            )));
        }
        if self.default_search_radius <= 0.0 || self.standard_distances.iter().any(|d| *d <= 0.0) {
            return Err(MapError::Config("distances must be positive".to_string()));
        }
        Ok(())
    }

    /// Standard distances in ascending order.
    pub fn sorted_standard_distances(&self) -> Vec<f64> {
        let mut distances = self.standard_distances.clone();
        distances.sort_by(|a, b| a.total_cmp(b));
        distances
    }

    /// Set the UI padding.
    pub fn with_fit_padding(mut self, padding: Padding) -> Self {
        self.fit_padding = padding;
        self
    }

    /// Set the standard distance radii.
    pub fn with_standard_distances(mut self, distances: Vec<f64>) -> Self {
        self.standard_distances = distances;
        self
    }

    /// Set the clustering thresholds.
    pub fn with_cluster_zooms(mut self, cluster_max_zoom: f64, unclustered_min_zoom: f64) -> Self {
        self.cluster_max_zoom = cluster_max_zoom;
        self.unclustered_min_zoom = unclustered_min_zoom;
        self
    }

    /// Set the fly-to speed.
    pub fn with_fly_speed(mut self, speed: f64) -> Self {
        self.fly_speed = speed;
        self
    }
}
