//! Declarative descriptions handed to the rendering surface.
//!
//! These mirror the style-spec objects a GL map library consumes and
//! serialize to style-spec-like JSON for hosts that forward them.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::geo::{Feature, LngLat, Padding};
use crate::model::{CategoryId, ProviderId};

/// Configuration of a GeoJSON data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// Whether points are aggregated into clusters.
    pub cluster: bool,
    /// Highest zoom at which points still cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_max_zoom: Option<f64>,
    /// Cluster radius in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_radius: Option<u32>,
    /// Aggregated cluster properties: output name and the summed input property.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cluster_sums: Vec<(String, String)>,
}

impl SourceSpec {
    /// Plain, unclustered source.
    pub fn plain() -> Self {
        Self {
            cluster: false,
            cluster_max_zoom: None,
            cluster_radius: None,
            cluster_sums: Vec::new(),
        }
    }

    /// Clustered point source.
    pub fn clustered(max_zoom: f64, radius: u32) -> Self {
        Self {
            cluster: true,
            cluster_max_zoom: Some(max_zoom),
            cluster_radius: Some(radius),
            cluster_sums: Vec::new(),
        }
    }

    /// Sum `input` over each cluster's members into the `output` property.
    pub fn with_cluster_sum(mut self, output: &str, input: &str) -> Self {
        self.cluster_sums.push((output.to_string(), input.to_string()));
        self
    }
}

/// Layer filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    All(Vec<FilterExpr>),
    Has(String),
    NotHas(String),
    Eq(String, Value),
    Gt(String, f64),
}

impl FilterExpr {
    pub fn has(key: &str) -> Self {
        FilterExpr::Has(key.to_string())
    }

    pub fn not_has(key: &str) -> Self {
        FilterExpr::NotHas(key.to_string())
    }

    pub fn eq(key: &str, value: impl Into<Value>) -> Self {
        FilterExpr::Eq(key.to_string(), value.into())
    }

    pub fn gt(key: &str, value: f64) -> Self {
        FilterExpr::Gt(key.to_string(), value)
    }

    /// Evaluate the filter against a feature's properties.
    pub fn matches(&self, feature: &Feature) -> bool {
        let props = &feature.properties;
        match self {
            FilterExpr::All(parts) => parts.iter().all(|p| p.matches(feature)),
            FilterExpr::Has(key) => props.contains_key(key),
            FilterExpr::NotHas(key) => !props.contains_key(key),
            FilterExpr::Eq(key, value) => match (props.get(key), value) {
                (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
                (Some(a), b) => a == b,
                (None, _) => false,
            },
            FilterExpr::Gt(key, value) => props
                .get(key)
                .and_then(Value::as_f64)
                .is_some_and(|v| v > *value),
        }
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterExpr::All(parts) => {
                let mut seq = serializer.serialize_seq(Some(parts.len() + 1))?;
                seq.serialize_element("all")?;
                for part in parts {
                    seq.serialize_element(part)?;
                }
                seq.end()
            }
            FilterExpr::Has(key) => ("has", key).serialize(serializer),
            FilterExpr::NotHas(key) => ("!has", key).serialize(serializer),
            FilterExpr::Eq(key, value) => ("==", key, value).serialize(serializer),
            FilterExpr::Gt(key, value) => (">", key, value).serialize(serializer),
        }
    }
}

/// Layout of a symbol layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SymbolLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_image: Option<String>,
    pub icon_size: f64,
    pub icon_allow_overlap: bool,
    pub icon_ignore_placement: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_padding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_font: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_offset: Option<[f64; 2]>,
}

impl SymbolLayout {
    /// Icon-only layout that always draws, ignoring collisions.
    pub fn icon(image: impl Into<String>, size: f64) -> Self {
        Self {
            icon_image: Some(image.into()),
            icon_size: size,
            icon_allow_overlap: true,
            icon_ignore_placement: true,
            ..Self::default()
        }
    }
}

/// Text paint of a symbol layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TextPaint {
    pub text_color: String,
    pub text_halo_color: String,
    pub text_halo_width: f64,
}

/// How a layer draws its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerStyle {
    Symbol {
        layout: SymbolLayout,
        #[serde(skip_serializing_if = "Option::is_none")]
        paint: Option<TextPaint>,
    },
    Fill {
        /// Fill colour, constant or a data expression such as `["get", "color"]`.
        #[serde(rename = "fill-color")]
        fill_color: Value,
    },
    Line {
        #[serde(rename = "line-color")]
        line_color: String,
        #[serde(rename = "line-width")]
        line_width: f64,
    },
}

/// A styled layer bound to a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    #[serde(flatten)]
    pub style: LayerStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
}

impl LayerSpec {
    /// Whether this layer would draw the given feature.
    pub fn draws(&self, feature: &Feature) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(feature))
    }
}

/// Short animated camera transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EaseOptions {
    pub center: LngLat,
    pub zoom: f64,
}

/// Long-distance zoom-out/zoom-in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlyOptions {
    pub center: LngLat,
    pub zoom: f64,
    pub speed: f64,
}

/// Fit-to-bounds transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitOptions {
    pub padding: Padding,
    pub duration_ms: u64,
    pub max_zoom: f64,
    pub linear: bool,
}

/// Handle of a marker placed on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Handle of a popup shown on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupHandle(pub u64);

/// Visual content of an overlay marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MarkerElement {
    /// Pin at the search center.
    CenterPin,
    /// Radius label on a distance ring.
    DistanceLabel { radius_miles: f64, text: String },
    /// Animated pulse over a highlighted provider.
    Selection {
        provider_id: ProviderId,
        category: CategoryId,
        name: String,
    },
}

/// A marker bound to geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub position: LngLat,
    pub element: MarkerElement,
}

/// A transient popup bound to geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupSpec {
    pub position: LngLat,
    /// Lines of text; the first line is the title.
    pub lines: Vec<String>,
    pub class_name: String,
    pub offset: f64,
    pub close_button: bool,
    pub close_on_click: bool,
}

impl PopupSpec {
    /// Non-interactive label popup.
    pub fn label(position: LngLat, lines: Vec<String>, class_name: &str, offset: f64) -> Self {
        Self {
            position,
            lines,
            class_name: class_name.to_string(),
            offset,
            close_button: false,
            close_on_click: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_serializes_as_expression_array() {
        let filter = FilterExpr::All(vec![
            FilterExpr::not_has("point_count"),
            FilterExpr::eq("typeId", "legal"),
        ]);

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!(["all", ["!has", "point_count"], ["==", "typeId", "legal"]])
        );
        assert_eq!(
            serde_json::to_value(FilterExpr::gt("sum", 0.0)).unwrap(),
            json!([">", "sum", 0.0])
        );
    }

    #[test]
    fn test_filter_matches_properties() {
        let point = Feature::point(LngLat::new(0.0, 0.0))
            .with_property("typeId", "legal")
            .with_property("highlighted", 1);
        let cluster = Feature::point(LngLat::new(0.0, 0.0))
            .with_property("point_count", 4)
            .with_property("sum", 0);

        let unclustered_legal = FilterExpr::All(vec![
            FilterExpr::not_has("point_count"),
            FilterExpr::eq("typeId", "legal"),
        ]);
        assert!(unclustered_legal.matches(&point));
        assert!(!unclustered_legal.matches(&cluster));

        assert!(FilterExpr::eq("highlighted", 1).matches(&point));
        assert!(!FilterExpr::gt("sum", 0.0).matches(&cluster));
        assert!(FilterExpr::has("point_count").matches(&cluster));
    }

    #[test]
    fn test_numeric_eq_ignores_integer_float_distinction() {
        let feature = Feature::point(LngLat::new(0.0, 0.0)).with_property("highlighted", 1);
        assert!(FilterExpr::eq("highlighted", 1.0).matches(&feature));
    }

    #[test]
    fn test_symbol_layer_serializes_kebab_case() {
        let layer = LayerSpec {
            id: "legal".to_string(),
            source: "displayData".to_string(),
            style: LayerStyle::Symbol {
                layout: SymbolLayout::icon("legalicon", 0.4),
                paint: None,
            },
            filter: None,
        };

        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(json["type"], "symbol");
        assert_eq!(json["layout"]["icon-image"], "legalicon");
        assert_eq!(json["layout"]["icon-allow-overlap"], true);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn test_clustered_source_spec() {
        let spec = SourceSpec::clustered(14.0, 50).with_cluster_sum("sum", "highlighted");
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["cluster"], true);
        assert_eq!(json["clusterMaxZoom"], 14.0);
        assert_eq!(json["clusterSums"][0], json!(["sum", "highlighted"]));
    }
}
