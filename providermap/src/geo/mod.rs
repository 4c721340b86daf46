//! Geometry utilities
//!
//! Pure functions converting provider records into map-native geometry,
//! computing bounding boxes, and measuring distances on the sphere. Nothing
//! in this module touches the rendering surface.

mod feature;
mod types;

pub use feature::{
    provider_feature, providers_to_features, Feature, FeatureCollection, Geometry,
    PROP_CLUSTER_ID, PROP_COLOR, PROP_HIGHLIGHTED, PROP_HIGHLIGHTED_SUM, PROP_ID, PROP_NAME,
    PROP_POINT_COUNT, PROP_TYPE_ID,
};
pub use types::{GeoBounds, LngLat, Padding, ScreenPoint};

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::model::{Provider, ProviderId};

/// Mean earth radius in miles (6371008.8 m).
pub const EARTH_RADIUS_MILES: f64 = 6_371_008.8 / 1609.344;

/// Equatorial circumference in miles, used by the zoom-for-distance fit.
pub const EARTH_CIRCUMFERENCE_MILES: f64 = 24_901.0;

/// Lookup table from provider id to provider.
pub type ProviderIndex<'a> = HashMap<&'a ProviderId, &'a Provider>;

/// Index providers by id for O(1) lookup.
pub fn providers_by_id(providers: &[Provider]) -> ProviderIndex<'_> {
    providers.iter().map(|p| (&p.id, p)).collect()
}

/// Keep only the ids that resolve to a provider in `index`, preserving order.
pub fn filter_provider_ids(index: &ProviderIndex<'_>, ids: &[ProviderId]) -> Vec<ProviderId> {
    ids.iter()
        .filter(|id| index.contains_key(id))
        .cloned()
        .collect()
}

/// Bounding box of the given providers. Unknown ids are skipped.
pub fn provider_bounding_box(index: &ProviderIndex<'_>, ids: &[ProviderId]) -> Option<GeoBounds> {
    GeoBounds::from_points(ids.iter().filter_map(|id| index.get(id)).map(|p| p.coordinates))
}

/// Great-circle destination from `origin` after travelling `distance_miles`
/// on the initial `bearing_deg` (clockwise from north).
pub fn destination(origin: LngLat, distance_miles: f64, bearing_deg: f64) -> LngLat {
    let lon1 = origin.lng.to_radians();
    let lat1 = origin.lat.to_radians();
    let bearing = bearing_deg.to_radians();
    let delta = distance_miles / EARTH_RADIUS_MILES;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    LngLat::new(lon2.to_degrees(), lat2.to_degrees())
}

/// Closed polygon ring approximating a circle of `radius_miles` around `center`.
///
/// Vertex `i` sits at bearing `-360 * i / steps`; the first vertex is
/// repeated at the end to close the ring.
pub fn circle(center: LngLat, radius_miles: f64, steps: usize) -> Vec<LngLat> {
    let steps = steps.max(3);
    let mut ring: Vec<LngLat> = (0..steps)
        .map(|i| destination(center, radius_miles, i as f64 * -360.0 / steps as f64))
        .collect();
    ring.push(ring[0]);
    ring
}

/// Zoom level at which a `distance_miles` radius fills the screen.
///
/// Derived from the Web Mercator ground resolution: at zoom `z` one pixel
/// covers `C * cos(lat) / 2^(z + 8)` miles, where `C` is the equatorial
/// circumference. The screen is sized to show roughly eight radii top to
/// bottom.
#[inline]
pub fn zoom_for_distance(distance_miles: f64, latitude: f64, screen_height_px: f64) -> f64 {
    let miles_per_pixel = distance_miles * 8.0 / screen_height_px;
    (EARTH_CIRCUMFERENCE_MILES * (latitude * PI / 180.0).cos() / miles_per_pixel).log2() - 8.0
}

/// Corners of the canvas rectangle left visible after `padding` is removed.
///
/// Returned clockwise from top-left.
pub fn padded_corners(canvas_width: f64, canvas_height: f64, padding: &Padding) -> [ScreenPoint; 4] {
    let left = padding.left;
    let top = padding.top;
    let right = canvas_width - padding.right;
    let bottom = canvas_height - padding.bottom;
    [
        ScreenPoint::new(left, top),
        ScreenPoint::new(right, top),
        ScreenPoint::new(right, bottom),
        ScreenPoint::new(left, bottom),
    ]
}
