//! Source and layer provisioning.
//!
//! Every source and layer is created at most once per surface. The
//! provisioner keeps its own registry of what it created because the
//! surface cannot report which handlers were attached to a layer; event
//! handlers are subscribed only at layer creation, so repeated `ensure_*`
//! calls never duplicate event delivery.
//!
//! Layers draw in creation order:
//!
//! ```text
//! distance-indicator-fill / -stroke      (on load)
//! clusterCircle / clusterCircleHighlighted / clusterText   (on load)
//! <category>...                          (as categories are enabled)
//! highlighted                            (first cycle)
//! ```

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::debug;

use crate::config::MapViewConfig;
use crate::geo::{FeatureCollection, PROP_HIGHLIGHTED, PROP_HIGHLIGHTED_SUM, PROP_POINT_COUNT, PROP_TYPE_ID};
use crate::icons::{category_icon, icon_name, CLUSTER_HIGHLIGHTED_ICON, CLUSTER_ICON};
use crate::model::CategoryId;
use crate::surface::{
    FilterExpr, LayerEventKind, LayerSpec, LayerStyle, MapSurface, SourceSpec, SurfaceError,
    SymbolLayout, TextPaint,
};

/// Clustered source holding every visible provider.
pub const PROVIDER_SOURCE: &str = "displayData";

/// Source holding distance ring polygons.
pub const DISTANCE_SOURCE: &str = "distance-indicator-source";

/// Layer drawing highlighted providers above their category icons.
pub const HIGHLIGHT_LAYER: &str = "highlighted";

/// Cluster pin without highlighted members.
pub const CLUSTER_LAYER: &str = "clusterCircle";

/// Cluster pin with at least one highlighted member.
pub const CLUSTER_HIGHLIGHTED_LAYER: &str = "clusterCircleHighlighted";

/// Cluster point-count label; receives cluster clicks and hovers.
pub const CLUSTER_TEXT_LAYER: &str = "clusterText";

/// Translucent fill of distance rings.
pub const DISTANCE_FILL_LAYER: &str = "distance-indicator-fill";

/// Outline of distance rings.
pub const DISTANCE_STROKE_LAYER: &str = "distance-indicator-stroke";

/// Events subscribed on every category layer.
const POINT_EVENTS: [LayerEventKind; 3] = [
    LayerEventKind::Click,
    LayerEventKind::MouseEnter,
    LayerEventKind::MouseLeave,
];

/// What a layer is for, as far as event routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    /// Individual provider icons of one category.
    Category,
    /// Cluster count labels.
    Cluster,
    /// Anything without interaction.
    Decoration,
}

/// Symbol layer for one provider category: unclustered points of that type.
pub fn category_layer(category: &CategoryId, icon_size: f64) -> LayerSpec {
    LayerSpec {
        id: category.as_str().to_string(),
        source: PROVIDER_SOURCE.to_string(),
        style: LayerStyle::Symbol {
            layout: SymbolLayout {
                icon_padding: Some(10.0),
                ..SymbolLayout::icon(category_icon(category), icon_size)
            },
            paint: None,
        },
        filter: Some(FilterExpr::All(vec![
            FilterExpr::not_has(PROP_POINT_COUNT),
            FilterExpr::eq(PROP_TYPE_ID, category.as_str()),
        ])),
    }
}

/// Symbol layer for highlighted providers.
pub fn highlight_layer(icon_size: f64) -> LayerSpec {
    LayerSpec {
        id: HIGHLIGHT_LAYER.to_string(),
        source: PROVIDER_SOURCE.to_string(),
        style: LayerStyle::Symbol {
            layout: SymbolLayout {
                icon_padding: Some(10.0),
                ..SymbolLayout::icon(icon_name(HIGHLIGHT_LAYER), icon_size)
            },
            paint: None,
        },
        filter: Some(FilterExpr::All(vec![
            FilterExpr::not_has(PROP_POINT_COUNT),
            FilterExpr::eq(PROP_HIGHLIGHTED, 1),
        ])),
    }
}

/// The three cluster layers, in draw order.
pub fn cluster_layers() -> [LayerSpec; 3] {
    let pin = |id: &str, icon: &str, filter: FilterExpr| LayerSpec {
        id: id.to_string(),
        source: PROVIDER_SOURCE.to_string(),
        style: LayerStyle::Symbol {
            layout: SymbolLayout::icon(icon, 0.5),
            paint: None,
        },
        filter: Some(filter),
    };

    [
        pin(
            CLUSTER_LAYER,
            CLUSTER_ICON,
            FilterExpr::All(vec![
                FilterExpr::has(PROP_POINT_COUNT),
                FilterExpr::eq(PROP_HIGHLIGHTED_SUM, 0),
            ]),
        ),
        pin(
            CLUSTER_HIGHLIGHTED_LAYER,
            CLUSTER_HIGHLIGHTED_ICON,
            FilterExpr::All(vec![
                FilterExpr::has(PROP_POINT_COUNT),
                FilterExpr::gt(PROP_HIGHLIGHTED_SUM, 0.0),
            ]),
        ),
        LayerSpec {
            id: CLUSTER_TEXT_LAYER.to_string(),
            source: PROVIDER_SOURCE.to_string(),
            style: LayerStyle::Symbol {
                layout: SymbolLayout {
                    icon_size: 0.4,
                    icon_allow_overlap: true,
                    icon_ignore_placement: true,
                    text_field: Some("{point_count_abbreviated}".to_string()),
                    text_font: vec![
                        "DIN Offc Pro Medium".to_string(),
                        "Arial Unicode MS Bold".to_string(),
                    ],
                    text_size: Some(18.0),
                    text_offset: Some([0.0, -0.3]),
                    ..SymbolLayout::default()
                },
                paint: Some(TextPaint {
                    text_color: "black".to_string(),
                    text_halo_color: "#ffffff".to_string(),
                    text_halo_width: 2.0,
                }),
            },
            filter: Some(FilterExpr::has(PROP_POINT_COUNT)),
        },
    ]
}

/// Fill and stroke layers of the distance rings.
pub fn distance_layers(config: &MapViewConfig) -> [LayerSpec; 2] {
    [
        LayerSpec {
            id: DISTANCE_FILL_LAYER.to_string(),
            source: DISTANCE_SOURCE.to_string(),
            style: LayerStyle::Fill {
                fill_color: json!(["get", crate::geo::PROP_COLOR]),
            },
            filter: None,
        },
        LayerSpec {
            id: DISTANCE_STROKE_LAYER.to_string(),
            source: DISTANCE_SOURCE.to_string(),
            style: LayerStyle::Line {
                line_color: config.ring_stroke_color.clone(),
                line_width: config.ring_stroke_width,
            },
            filter: None,
        },
    ]
}

/// Idempotent creator of the view's sources and layers.
#[derive(Debug)]
pub struct Provisioner {
    sources: HashSet<String>,
    layers: Vec<String>,
    roles: HashMap<String, LayerRole>,
    handlers: HashMap<String, Vec<LayerEventKind>>,
    cluster_max_zoom: f64,
    cluster_radius: u32,
    icon_size: f64,
    distance_layers: [LayerSpec; 2],
}

impl Provisioner {
    pub fn new(config: &MapViewConfig) -> Self {
        Self {
            sources: HashSet::new(),
            layers: Vec::new(),
            roles: HashMap::new(),
            handlers: HashMap::new(),
            cluster_max_zoom: config.cluster_max_zoom,
            cluster_radius: config.cluster_radius,
            icon_size: config.icon_size,
            distance_layers: distance_layers(config),
        }
    }

    /// Create the clustered provider source if missing.
    ///
    /// Clusters sum their members' `highlighted` flags into `sum` so cluster
    /// pins can be styled by whether they contain a selection.
    pub fn ensure_source<S: MapSurface>(&mut self, surface: &mut S) -> Result<bool, SurfaceError> {
        let spec = SourceSpec::clustered(self.cluster_max_zoom, self.cluster_radius)
            .with_cluster_sum(PROP_HIGHLIGHTED_SUM, PROP_HIGHLIGHTED);
        self.ensure_source_with(surface, PROVIDER_SOURCE, &spec)
    }

    /// Create the distance ring source and its fill/stroke layers if missing.
    pub fn ensure_distance_layers<S: MapSurface>(
        &mut self,
        surface: &mut S,
    ) -> Result<usize, SurfaceError> {
        self.ensure_source_with(surface, DISTANCE_SOURCE, &SourceSpec::plain())?;
        let layers = self.distance_layers.clone();
        let mut created = 0;
        for layer in &layers {
            created += usize::from(self.ensure(surface, layer, LayerRole::Decoration, &[])?);
        }
        Ok(created)
    }

    /// Create the cluster pin and label layers if missing.
    pub fn ensure_cluster_layers<S: MapSurface>(
        &mut self,
        surface: &mut S,
    ) -> Result<usize, SurfaceError> {
        let [plain, highlighted, text] = cluster_layers();
        let mut created = 0;
        created += usize::from(self.ensure(surface, &plain, LayerRole::Decoration, &[])?);
        created += usize::from(self.ensure(surface, &highlighted, LayerRole::Decoration, &[])?);
        created += usize::from(self.ensure(surface, &text, LayerRole::Cluster, &POINT_EVENTS)?);
        Ok(created)
    }

    /// Create the symbol layer for `category` if it does not exist yet.
    ///
    /// Click and hover handlers are subscribed only when the layer is created.
    pub fn ensure_layer<S: MapSurface>(
        &mut self,
        surface: &mut S,
        category: &CategoryId,
    ) -> Result<bool, SurfaceError> {
        if self.roles.contains_key(category.as_str()) {
            return Ok(false);
        }
        let spec = category_layer(category, self.icon_size);
        self.ensure(surface, &spec, LayerRole::Category, &POINT_EVENTS)
    }

    /// Create the highlighted-provider layer if missing.
    pub fn ensure_highlight_layer<S: MapSurface>(
        &mut self,
        surface: &mut S,
    ) -> Result<bool, SurfaceError> {
        let spec = highlight_layer(self.icon_size);
        self.ensure(surface, &spec, LayerRole::Decoration, &[])
    }

    /// Replace the provider source's features wholesale.
    ///
    /// Every layer on the source repaints; there is no incremental diff.
    pub fn push_features<S: MapSurface>(
        &mut self,
        surface: &mut S,
        features: &FeatureCollection,
    ) -> Result<(), SurfaceError> {
        self.ensure_source(surface)?;
        surface.set_source_data(PROVIDER_SOURCE, features)
    }

    /// Replace the distance ring source's features.
    pub fn push_rings<S: MapSurface>(
        &mut self,
        surface: &mut S,
        rings: &FeatureCollection,
    ) -> Result<(), SurfaceError> {
        self.ensure_distance_layers(surface)?;
        surface.set_source_data(DISTANCE_SOURCE, rings)
    }

    /// Event routing role of a layer this provisioner created.
    pub fn role(&self, layer: &str) -> Option<LayerRole> {
        self.roles.get(layer).copied()
    }

    /// Whether `kind` events were subscribed for `layer`.
    pub fn handles(&self, layer: &str, kind: LayerEventKind) -> bool {
        self.handlers
            .get(layer)
            .is_some_and(|kinds| kinds.contains(&kind))
    }

    /// Layers created so far, in creation order.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    fn ensure_source_with<S: MapSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
        spec: &SourceSpec,
    ) -> Result<bool, SurfaceError> {
        if self.sources.contains(id) {
            return Ok(false);
        }
        if !surface.has_source(id) {
            surface.add_source(id, spec)?;
            debug!(source = id, cluster = spec.cluster, "Source created");
        }
        self.sources.insert(id.to_string());
        Ok(true)
    }

    fn ensure<S: MapSurface>(
        &mut self,
        surface: &mut S,
        spec: &LayerSpec,
        role: LayerRole,
        events: &[LayerEventKind],
    ) -> Result<bool, SurfaceError> {
        if self.roles.contains_key(&spec.id) {
            return Ok(false);
        }
        if surface.has_layer(&spec.id) {
            // Present in the base style; adopt it without handlers.
            self.roles.insert(spec.id.clone(), LayerRole::Decoration);
            return Ok(false);
        }

        surface.add_layer(spec)?;
        self.layers.push(spec.id.clone());
        self.roles.insert(spec.id.clone(), role);
        debug!(layer = %spec.id, ?role, "Layer created");

        let subscribed = self.handlers.entry(spec.id.clone()).or_default();
        for kind in events {
            surface.subscribe(&spec.id, *kind)?;
            subscribed.push(*kind);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{provider_feature, Feature, LngLat, PROP_HIGHLIGHTED_SUM};
    use crate::model::Provider;
    use crate::surface::RecordingSurface;

    fn provisioner() -> Provisioner {
        Provisioner::new(&MapViewConfig::default())
    }

    #[test]
    fn test_ensure_source_once() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();

        assert!(prov.ensure_source(&mut surface).unwrap());
        assert!(!prov.ensure_source(&mut surface).unwrap());

        let spec = surface.source_spec(PROVIDER_SOURCE).unwrap();
        assert!(spec.cluster);
        assert_eq!(spec.cluster_max_zoom, Some(14.0));
        assert_eq!(spec.cluster_sums, vec![("sum".to_string(), "highlighted".to_string())]);
    }

    #[test]
    fn test_ensure_layer_twice_registers_once() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();
        prov.ensure_source(&mut surface).unwrap();
        let legal = CategoryId::new("legal");

        assert!(prov.ensure_layer(&mut surface, &legal).unwrap());
        assert!(!prov.ensure_layer(&mut surface, &legal).unwrap());

        assert_eq!(surface.layer_ids(), vec!["legal"]);
        assert_eq!(surface.subscription_count("legal", LayerEventKind::Click), 1);
        assert_eq!(surface.subscription_count("legal", LayerEventKind::MouseEnter), 1);
        assert!(prov.handles("legal", LayerEventKind::Click));
        assert_eq!(prov.role("legal"), Some(LayerRole::Category));
    }

    #[test]
    fn test_layer_adopted_from_style_gets_no_handlers() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();
        prov.ensure_source(&mut surface).unwrap();
        surface
            .add_layer(&category_layer(&CategoryId::new("food"), 0.4))
            .unwrap();

        assert!(!prov.ensure_layer(&mut surface, &CategoryId::new("food")).unwrap());
        assert_eq!(surface.subscription_count("food", LayerEventKind::Click), 0);
        assert!(!prov.handles("food", LayerEventKind::Click));
    }

    #[test]
    fn test_category_layer_draws_only_unclustered_points_of_category() {
        let layer = category_layer(&CategoryId::new("legal"), 0.4);
        let legal = provider_feature(
            &Provider::new("a", "legal", "A", LngLat::new(0.0, 0.0)),
            false,
        );
        let food = provider_feature(
            &Provider::new("b", "food", "B", LngLat::new(0.0, 0.0)),
            false,
        );
        let cluster = Feature::point(LngLat::new(0.0, 0.0))
            .with_property(PROP_POINT_COUNT, 3)
            .with_property(PROP_TYPE_ID, "legal");

        assert!(layer.draws(&legal));
        assert!(!layer.draws(&food));
        assert!(!layer.draws(&cluster));
    }

    #[test]
    fn test_cluster_layers_split_on_highlighted_sum() {
        let [plain, highlighted, text] = cluster_layers();
        let quiet = Feature::point(LngLat::new(0.0, 0.0))
            .with_property(PROP_POINT_COUNT, 3)
            .with_property(PROP_HIGHLIGHTED_SUM, 0);
        let hot = Feature::point(LngLat::new(0.0, 0.0))
            .with_property(PROP_POINT_COUNT, 3)
            .with_property(PROP_HIGHLIGHTED_SUM, 2);

        assert!(plain.draws(&quiet) && !plain.draws(&hot));
        assert!(highlighted.draws(&hot) && !highlighted.draws(&quiet));
        assert!(text.draws(&quiet) && text.draws(&hot));
    }

    #[test]
    fn test_cluster_text_is_the_only_interactive_cluster_layer() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();
        prov.ensure_source(&mut surface).unwrap();

        assert_eq!(prov.ensure_cluster_layers(&mut surface).unwrap(), 3);
        assert_eq!(prov.ensure_cluster_layers(&mut surface).unwrap(), 0);

        assert_eq!(surface.subscription_count(CLUSTER_TEXT_LAYER, LayerEventKind::Click), 1);
        assert_eq!(surface.subscription_count(CLUSTER_LAYER, LayerEventKind::Click), 0);
        assert_eq!(prov.role(CLUSTER_TEXT_LAYER), Some(LayerRole::Cluster));
    }

    #[test]
    fn test_distance_layers_idempotent() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();

        assert_eq!(prov.ensure_distance_layers(&mut surface).unwrap(), 2);
        assert_eq!(prov.ensure_distance_layers(&mut surface).unwrap(), 0);
        assert_eq!(
            surface.layer_ids(),
            vec![DISTANCE_FILL_LAYER, DISTANCE_STROKE_LAYER]
        );
    }

    #[test]
    fn test_push_features_creates_missing_source() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();
        let data = FeatureCollection::new(vec![Feature::point(LngLat::new(1.0, 2.0))]);

        prov.push_features(&mut surface, &data).unwrap();

        assert_eq!(surface.source_data(PROVIDER_SOURCE), Some(&data));
        assert_eq!(surface.set_data_count(PROVIDER_SOURCE), 1);
    }

    #[test]
    fn test_layer_on_missing_source_errors_without_registering() {
        let mut surface = RecordingSurface::default();
        let mut prov = provisioner();

        assert!(prov.ensure_layer(&mut surface, &CategoryId::new("legal")).is_err());
        assert!(prov.role("legal").is_none());

        // Recovers once the source exists
        prov.ensure_source(&mut surface).unwrap();
        assert!(prov.ensure_layer(&mut surface, &CategoryId::new("legal")).unwrap());
    }
}
