//! Camera control.
//!
//! Deciding whether to move the camera is a pure function of the previous
//! and current [`ViewSnapshot`]. The checks run in a fixed priority order
//! and the first match wins, so at most one animation starts per cycle:
//!
//! ```text
//! zoom-to-fit key changed ──────────► ZoomToFit
//!          │ no
//! distance or search key changed ───► Recenter
//!          │ no
//! new selection outside viewport ───► RevealSelection
//!          │ no
//! fly-to-provider key changed ──────► FlyToProvider
//!          │ no
//!          ▼
//!        None
//! ```
//!
//! Executing an intent is fire-and-forget. A later intent simply issues a
//! new call and the surface supersedes the running animation.

use std::collections::HashSet;

use tracing::debug;

use crate::config::MapViewConfig;
use crate::geo::{
    filter_provider_ids, padded_corners, provider_bounding_box, zoom_for_distance, GeoBounds,
    LngLat, Padding, ProviderIndex,
};
use crate::model::{MapProps, ProviderId};
use crate::surface::{FitOptions, FlyOptions, MapSurface};

/// The parts of the props the camera reacts to.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub zoom_to_fit_key: u64,
    pub search_key: u64,
    pub fly_to_provider_key: u64,
    pub fly_to_provider_id: Option<ProviderId>,
    pub distance: Option<f64>,
    pub search_center: LngLat,
    pub highlighted: Vec<ProviderId>,
}

impl ViewSnapshot {
    pub fn of(props: &MapProps) -> Self {
        Self {
            zoom_to_fit_key: props.search.zoom_to_fit_key,
            search_key: props.search.search_key,
            fly_to_provider_key: props.search.fly_to_provider_key,
            fly_to_provider_id: props.search.fly_to_provider_id.clone(),
            distance: props.filters.radius(),
            search_center: props.search.coordinates,
            highlighted: props.highlighted_providers.clone(),
        }
    }

    /// Ids highlighted here but not in `prev`, in order.
    pub fn new_selection<'a>(&'a self, prev: &ViewSnapshot) -> Vec<&'a ProviderId> {
        let before: HashSet<&ProviderId> = prev.highlighted.iter().collect();
        self.highlighted
            .iter()
            .filter(|id| !before.contains(id))
            .collect()
    }
}

/// What the camera should do this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraIntent {
    /// Leave the camera alone.
    None,
    /// Fit the highlighted providers, or every visible one if none are.
    ZoomToFit,
    /// Fly to the search center at a zoom that frames the search radius.
    Recenter { center: LngLat, zoom: f64 },
    /// Newly highlighted providers are off-screen; fit the highlighted set.
    RevealSelection(Vec<ProviderId>),
    /// Fly to one provider at the uncluster zoom.
    FlyToProvider(ProviderId),
}

impl CameraIntent {
    pub fn moves_camera(&self) -> bool {
        !matches!(self, CameraIntent::None)
    }
}

/// Surface-derived inputs to [`derive_intent`].
#[derive(Debug, Clone, Copy)]
pub struct CameraContext<'a> {
    pub providers: &'a ProviderIndex<'a>,
    /// Geographic bounds of the unobstructed part of the canvas.
    pub viewport: Option<GeoBounds>,
    pub screen_height: f64,
    /// Radius framed by a search with no distance filter.
    pub default_radius: f64,
}

/// Pick this cycle's camera intent.
pub fn derive_intent(prev: &ViewSnapshot, curr: &ViewSnapshot, ctx: &CameraContext<'_>) -> CameraIntent {
    if curr.zoom_to_fit_key != prev.zoom_to_fit_key {
        return CameraIntent::ZoomToFit;
    }

    if curr.distance != prev.distance || curr.search_key != prev.search_key {
        let radius = curr.distance.unwrap_or(ctx.default_radius);
        return CameraIntent::Recenter {
            center: curr.search_center,
            zoom: zoom_for_distance(radius, curr.search_center.lat, ctx.screen_height),
        };
    }

    if let Some(viewport) = ctx.viewport {
        let off_screen: Vec<ProviderId> = curr
            .new_selection(prev)
            .into_iter()
            .filter(|id| {
                ctx.providers
                    .get(id)
                    .is_some_and(|p| !viewport.contains(p.coordinates))
            })
            .cloned()
            .collect();
        if !off_screen.is_empty() {
            return CameraIntent::RevealSelection(off_screen);
        }
    }

    if curr.fly_to_provider_key != prev.fly_to_provider_key {
        if let Some(id) = &curr.fly_to_provider_id {
            return CameraIntent::FlyToProvider(id.clone());
        }
    }

    CameraIntent::None
}

/// Geographic bounds of the canvas minus the UI padding.
///
/// The provider list covers the left side of the map, so "on screen" means
/// inside this rectangle rather than the raw canvas.
pub fn padded_viewport<S: MapSurface>(surface: &S, padding: &Padding) -> Option<GeoBounds> {
    let (width, height) = surface.canvas_size();
    let corners = padded_corners(width, height, padding);
    GeoBounds::from_points(corners.iter().map(|c| surface.unproject(*c)))
}

/// Turns camera intents into surface animations.
#[derive(Debug, Clone)]
pub struct CameraController {
    padding: Padding,
    fit_duration_ms: u64,
    max_zoom: f64,
    fly_speed: f64,
    default_radius: f64,
}

impl CameraController {
    pub fn new(config: &MapViewConfig) -> Self {
        Self {
            padding: config.fit_padding,
            fit_duration_ms: config.fit_duration_ms,
            max_zoom: config.unclustered_min_zoom,
            fly_speed: config.fly_speed,
            default_radius: config.default_search_radius,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            padding: self.padding,
            duration_ms: self.fit_duration_ms,
            max_zoom: self.max_zoom,
            linear: false,
        }
    }

    /// Read the surface and derive this cycle's intent.
    pub fn decide<S: MapSurface>(
        &self,
        surface: &S,
        prev: &ViewSnapshot,
        curr: &ViewSnapshot,
        providers: &ProviderIndex<'_>,
    ) -> CameraIntent {
        let ctx = CameraContext {
            providers,
            viewport: padded_viewport(surface, &self.padding),
            screen_height: surface.screen_height(),
            default_radius: self.default_radius,
        };
        derive_intent(prev, curr, &ctx)
    }

    /// Start the animation for `intent`. Returns whether the camera moved.
    ///
    /// Targets that no longer resolve (no providers to fit, an unknown
    /// fly-to id) abort the move.
    pub fn execute<S: MapSurface>(
        &self,
        surface: &mut S,
        intent: &CameraIntent,
        highlighted: &[ProviderId],
        providers: &ProviderIndex<'_>,
    ) -> bool {
        match intent {
            CameraIntent::None => false,
            CameraIntent::ZoomToFit | CameraIntent::RevealSelection(_) => {
                self.fit(surface, highlighted, providers)
            }
            CameraIntent::Recenter { center, zoom } => {
                self.fly(surface, *center, *zoom);
                true
            }
            CameraIntent::FlyToProvider(id) => match providers.get(id) {
                Some(provider) => {
                    self.fly(surface, provider.coordinates, self.max_zoom);
                    true
                }
                None => {
                    debug!(provider = %id, "Fly-to target not visible");
                    false
                }
            },
        }
    }

    fn fit<S: MapSurface>(
        &self,
        surface: &mut S,
        highlighted: &[ProviderId],
        providers: &ProviderIndex<'_>,
    ) -> bool {
        let mut ids = filter_provider_ids(providers, highlighted);
        if ids.is_empty() {
            ids = providers.keys().map(|id| (*id).clone()).collect();
        }

        match provider_bounding_box(providers, &ids) {
            Some(bounds) => {
                debug!(providers = ids.len(), ?bounds, "Fitting camera");
                surface.fit_bounds(&bounds, &self.fit_options());
                true
            }
            None => {
                debug!("Nothing to fit");
                false
            }
        }
    }

    fn fly<S: MapSurface>(&self, surface: &mut S, center: LngLat, zoom: f64) {
        debug!(%center, zoom, "Flying camera");
        surface.fly_to(&FlyOptions {
            center,
            zoom,
            speed: self.fly_speed,
        });
    }
}
