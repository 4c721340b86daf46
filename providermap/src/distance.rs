//! Distance indicator: concentric search-radius rings with labels.
//!
//! Rings are polygons in the distance source; the center pin and radius
//! labels are standalone markers. The whole overlay is rebuilt only when the
//! `(distance filter, search coordinates)` pair changes.

use tracing::debug;

use crate::config::MapViewConfig;
use crate::geo::{circle, destination, Feature, FeatureCollection, LngLat, PROP_COLOR};
use crate::markers::{MarkerKey, MarkerRegistry};
use crate::model::MapProps;
use crate::provision::Provisioner;
use crate::surface::{MapSurface, MarkerElement, MarkerSpec, SurfaceError};

/// Bearing of radius labels: due east of the search point.
pub const LABEL_BEARING: f64 = 90.0;

/// The inputs the overlay depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceKey {
    pub distance: Option<f64>,
    pub center: LngLat,
}

impl DistanceKey {
    pub fn of(props: &MapProps) -> Self {
        Self {
            distance: props.filters.radius(),
            center: props.search.coordinates,
        }
    }
}

/// Change guard over [`DistanceKey`].
///
/// Remembers the key of the last overlay that was applied.
#[derive(Debug, Clone, Default)]
pub struct DistanceGuard {
    applied: Option<DistanceKey>,
}

impl DistanceGuard {
    /// A guard that treats `key` as already drawn.
    pub fn primed(key: DistanceKey) -> Self {
        Self { applied: Some(key) }
    }

    pub fn is_stale(&self, key: &DistanceKey) -> bool {
        self.applied.as_ref() != Some(key)
    }

    pub fn commit(&mut self, key: DistanceKey) {
        self.applied = Some(key);
    }
}

/// A radius label marker.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlan {
    pub radius_miles: f64,
    pub position: LngLat,
    pub text: String,
}

/// Desired state of the whole overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceOverlay {
    pub center: LngLat,
    /// Whether the center pin is shown.
    pub pin: bool,
    /// Labels in ascending radius order.
    pub labels: Vec<LabelPlan>,
    /// Ring polygons, largest first.
    pub rings: FeatureCollection,
}

impl DistanceOverlay {
    /// An overlay with nothing drawn.
    pub fn empty(center: LngLat) -> Self {
        Self {
            center,
            pin: false,
            labels: Vec::new(),
            rings: FeatureCollection::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.pin && self.labels.is_empty() && self.rings.is_empty()
    }
}

/// Label text for a radius.
pub fn label_text(radius_miles: f64) -> String {
    format!("{} mi", radius_miles)
}

/// Radii to draw: the filter's radius alone, or every standard distance.
pub fn radii(config: &MapViewConfig, distance: Option<f64>) -> Vec<f64> {
    match distance {
        Some(d) => vec![d],
        None => config.sorted_standard_distances(),
    }
}

/// Compute the overlay for the current props.
///
/// Nothing is drawn until the user has either picked a distance or moved
/// the search away from the default location.
pub fn plan_overlay(config: &MapViewConfig, props: &MapProps) -> DistanceOverlay {
    let center = props.search.coordinates;
    let distance = props.filters.radius();
    if distance.is_none() && !props.search.is_user_search() {
        return DistanceOverlay::empty(center);
    }

    let radii = radii(config, distance);
    let labels = radii
        .iter()
        .map(|&r| LabelPlan {
            radius_miles: r,
            position: destination(center, r, LABEL_BEARING),
            text: label_text(r),
        })
        .collect();

    let rings = radii
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &r)| {
            let color = if i == 0 {
                &config.outer_ring_color
            } else {
                &config.inner_ring_color
            };
            Feature::polygon(circle(center, r, config.circle_steps))
                .with_property(PROP_COLOR, color.as_str())
        })
        .collect();

    DistanceOverlay {
        center,
        pin: true,
        labels,
        rings: FeatureCollection::new(rings),
    }
}

/// Marker churn caused by applying an overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayApplied {
    pub markers_removed: usize,
    pub markers_added: usize,
    pub rings: usize,
}

/// Replace whatever overlay is on the surface with `overlay`.
pub fn apply_overlay<S: MapSurface>(
    surface: &mut S,
    provisioner: &mut Provisioner,
    registry: &mut MarkerRegistry,
    overlay: &DistanceOverlay,
) -> Result<OverlayApplied, SurfaceError> {
    let mut applied = OverlayApplied {
        markers_removed: registry.clear_distance_markers(surface),
        ..OverlayApplied::default()
    };

    provisioner.push_rings(surface, &overlay.rings)?;
    applied.rings = overlay.rings.len();

    if overlay.pin {
        let pin = MarkerSpec {
            position: overlay.center,
            element: MarkerElement::CenterPin,
        };
        registry.place(surface, MarkerKey::CenterPin, &pin)?;
        applied.markers_added += 1;
    }

    for (i, label) in overlay.labels.iter().enumerate() {
        let spec = MarkerSpec {
            position: label.position,
            element: MarkerElement::DistanceLabel {
                radius_miles: label.radius_miles,
                text: label.text.clone(),
            },
        };
        registry.place(surface, MarkerKey::DistanceLabel(i), &spec)?;
        applied.markers_added += 1;
    }

    Ok(applied)
}

/// Guarded overlay regeneration.
#[derive(Debug, Clone)]
pub struct DistanceIndicator {
    guard: DistanceGuard,
    config: MapViewConfig,
}

impl DistanceIndicator {
    /// Indicator for a view mounted with `initial`.
    ///
    /// Props that plan an empty overlay count as already drawn. Any other
    /// overlay is drawn by the first cycle.
    pub fn new(config: &MapViewConfig, initial: &MapProps) -> Self {
        let guard = if plan_overlay(config, initial).is_empty() {
            DistanceGuard::primed(DistanceKey::of(initial))
        } else {
            DistanceGuard::default()
        };
        Self {
            guard,
            config: config.clone(),
        }
    }

    /// Regenerate the overlay if its inputs changed.
    ///
    /// Returns `Ok(None)` when the guard skipped regeneration. A failed
    /// apply leaves the guard stale so the next cycle tries again.
    pub fn sync<S: MapSurface>(
        &mut self,
        surface: &mut S,
        provisioner: &mut Provisioner,
        registry: &mut MarkerRegistry,
        props: &MapProps,
    ) -> Result<Option<OverlayApplied>, SurfaceError> {
        let key = DistanceKey::of(props);
        if !self.guard.is_stale(&key) {
            return Ok(None);
        }

        let overlay = plan_overlay(&self.config, props);
        let applied = apply_overlay(surface, provisioner, registry, &overlay)?;
        self.guard.commit(key);

        debug!(
            distance = ?key.distance,
            center = %key.center,
            rings = applied.rings,
            labels = overlay.labels.len(),
            "Distance overlay regenerated"
        );
        Ok(Some(applied))
    }
}
