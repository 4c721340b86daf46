//! GeoJSON-shaped feature records pushed into map data sources.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::LngLat;
use crate::model::{Provider, ProviderId};

/// Feature property holding the provider id.
pub const PROP_ID: &str = "id";
/// Feature property holding the provider category.
pub const PROP_TYPE_ID: &str = "typeId";
/// Feature property holding the provider display name.
pub const PROP_NAME: &str = "name";
/// Feature property set to 1 for highlighted providers, 0 otherwise.
pub const PROP_HIGHLIGHTED: &str = "highlighted";
/// Fill colour of a distance ring.
pub const PROP_COLOR: &str = "color";
/// Cluster id assigned by the clustering source.
pub const PROP_CLUSTER_ID: &str = "cluster_id";
/// Number of points aggregated in a cluster.
pub const PROP_POINT_COUNT: &str = "point_count";
/// Per-cluster sum of member `highlighted` flags.
pub const PROP_HIGHLIGHTED_SUM: &str = "sum";

/// Feature geometry. Only the shapes the view produces are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LngLat),
    Polygon(Vec<Vec<LngLat>>),
}

/// A single geometry + property record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Point feature with no properties.
    pub fn point(at: LngLat) -> Self {
        Self {
            geometry: Geometry::Point(at),
            properties: Map::new(),
        }
    }

    /// Polygon feature from a single closed ring.
    pub fn polygon(ring: Vec<LngLat>) -> Self {
        Self {
            geometry: Geometry::Polygon(vec![ring]),
            properties: Map::new(),
        }
    }

    /// Set a property, builder style.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Point coordinates, if this is a point feature.
    pub fn point_coordinates(&self) -> Option<LngLat> {
        match &self.geometry {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(_) => None,
        }
    }

    /// String property lookup. Numeric ids are rendered as strings.
    pub fn string_property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Unsigned integer property lookup.
    pub fn u64_property(&self, key: &str) -> Option<u64> {
        self.properties.get(key)?.as_u64()
    }

    /// Provider id carried by this feature, if any.
    pub fn provider_id(&self) -> Option<ProviderId> {
        self.string_property(PROP_ID).map(ProviderId::from)
    }
}

/// The payload a data source is replaced with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Convert one provider to a point feature with its highlight flag.
pub fn provider_feature(provider: &Provider, highlighted: bool) -> Feature {
    Feature::point(provider.coordinates)
        .with_property(PROP_ID, provider.id.as_str())
        .with_property(PROP_TYPE_ID, provider.type_id.as_str())
        .with_property(PROP_NAME, provider.name.as_str())
        .with_property(PROP_HIGHLIGHTED, u8::from(highlighted))
}

/// Materialize the visible providers as a feature collection.
///
/// The `highlighted` flag is recomputed from `highlighted` on every call.
pub fn providers_to_features(
    providers: &[Provider],
    highlighted: &HashSet<&ProviderId>,
) -> FeatureCollection {
    FeatureCollection::new(
        providers
            .iter()
            .map(|p| provider_feature(p, highlighted.contains(&p.id)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> Provider {
        Provider::new(id, "legal", format!("Provider {}", id), LngLat::new(-71.0, 42.3))
    }

    #[test]
    fn test_provider_feature_properties() {
        let feature = provider_feature(&provider("p1"), true);

        assert_eq!(feature.point_coordinates(), Some(LngLat::new(-71.0, 42.3)));
        assert_eq!(feature.provider_id(), Some(ProviderId::new("p1")));
        assert_eq!(feature.string_property(PROP_TYPE_ID).as_deref(), Some("legal"));
        assert_eq!(feature.u64_property(PROP_HIGHLIGHTED), Some(1));
    }

    #[test]
    fn test_feature_serializes_as_geojson() {
        let feature = provider_feature(&provider("p1"), false);
        let json = serde_json::to_value(&feature).unwrap();

        assert_eq!(json["type"], "Feature");
        assert_eq!(json["geometry"]["type"], "Point");
        assert_eq!(json["geometry"]["coordinates"][0], -71.0);
        assert_eq!(json["properties"]["highlighted"], 0);
    }

    #[test]
    fn test_collection_serializes_type_tag() {
        let json = serde_json::to_value(FeatureCollection::empty()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert!(json["features"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_numeric_id_property_reads_as_string() {
        let feature = Feature::point(LngLat::new(0.0, 0.0)).with_property(PROP_ID, 42);
        assert_eq!(feature.provider_id(), Some(ProviderId::new("42")));
    }

    #[test]
    fn test_providers_to_features_flags_only_highlighted() {
        let providers = vec![provider("a"), provider("b"), provider("c")];
        let b = ProviderId::new("b");
        let highlighted: HashSet<&ProviderId> = [&b].into_iter().collect();

        let collection = providers_to_features(&providers, &highlighted);
        let flags: Vec<_> = collection
            .features
            .iter()
            .map(|f| f.u64_property(PROP_HIGHLIGHTED).unwrap())
            .collect();

        assert_eq!(flags, vec![0, 1, 0]);
    }
}
