//! Domain records supplied by the host application state container.
//!
//! The view treats everything in this module as read-only input. Providers
//! arrive already filtered to the visible set; the `highlighted` styling flag
//! is never stored here but derived per cycle from
//! [`MapProps::highlighted_providers`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::LngLat;

/// Stable identity of a service provider record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Provider category (e.g. "legal", "health"). One map layer exists per category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// Create a category id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id string. Doubles as the category's layer id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A service provider placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: ProviderId,
    pub type_id: CategoryId,
    pub name: String,
    pub coordinates: LngLat,
}

impl Provider {
    /// Create a provider record.
    pub fn new(
        id: impl Into<ProviderId>,
        type_id: impl Into<CategoryId>,
        name: impl Into<String>,
        coordinates: LngLat,
    ) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            name: name.into(),
            coordinates,
        }
    }
}

/// Active list filters. Only the distance filter concerns the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    /// Search radius in miles, `None` when no distance filter is applied.
    pub distance: Option<f64>,
}

impl Filters {
    /// The distance filter as a usable radius.
    ///
    /// Zero, negative, and non-finite distances mean no filter.
    pub fn radius(&self) -> Option<f64> {
        self.distance.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Where the current search location came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchOrigin {
    /// The app's built-in starting location; the user has not searched yet.
    #[default]
    Default,
    /// The device's current location.
    CurrentLocation,
    /// A geocoded address the user picked.
    Address,
}

/// Search state read from the host every cycle.
///
/// The `*_key` fields are monotonically increasing request counters. A key
/// that differs from the previous cycle's value is a fresh request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    /// Center of the active search (distance rings are drawn around it).
    pub coordinates: LngLat,
    /// Initial map center used at mount.
    pub map_center: LngLat,
    pub current_location: SearchOrigin,
    pub zoom_to_fit_key: u64,
    pub fly_to_provider_key: u64,
    pub fly_to_provider_id: Option<ProviderId>,
    pub search_key: u64,
}

impl SearchState {
    /// Search state centered on `center` with no pending requests.
    pub fn at(center: LngLat) -> Self {
        Self {
            coordinates: center,
            map_center: center,
            current_location: SearchOrigin::Default,
            zoom_to_fit_key: 0,
            fly_to_provider_key: 0,
            fly_to_provider_id: None,
            search_key: 0,
        }
    }

    /// Whether the user moved the search away from the default location.
    pub fn is_user_search(&self) -> bool {
        self.current_location != SearchOrigin::Default
    }
}

/// Everything the map view reads from the host in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapProps {
    pub visible_providers: Vec<Provider>,
    /// Ordered ids of selected or filter-matched providers.
    pub highlighted_providers: Vec<ProviderId>,
    pub filters: Filters,
    pub search: SearchState,
    /// Categories enabled in the UI; each gets a layer on first appearance.
    pub loaded_category_ids: Vec<CategoryId>,
    /// Provider whose detail panel is currently open, if any.
    pub detail_provider_id: Option<ProviderId>,
}

impl MapProps {
    /// Empty props centered on `center`.
    pub fn new(center: LngLat) -> Self {
        Self {
            visible_providers: Vec::new(),
            highlighted_providers: Vec::new(),
            filters: Filters::default(),
            search: SearchState::at(center),
            loaded_category_ids: Vec::new(),
            detail_provider_id: None,
        }
    }

    /// Highlighted ids as a set for O(1) membership checks.
    pub fn highlighted_set(&self) -> HashSet<&ProviderId> {
        self.highlighted_providers.iter().collect()
    }

    /// Whether the given provider is currently highlighted.
    pub fn is_highlighted(&self, id: &ProviderId) -> bool {
        self.highlighted_providers.contains(id)
    }

    /// Whether the provider is highlighted and its detail view is already open.
    pub fn is_selected_and_displayed(&self, id: &ProviderId) -> bool {
        self.is_highlighted(id) && self.detail_provider_id.as_ref() == Some(id)
    }
}

/// Callbacks into the host state container.
///
/// The view never mutates props directly; user interactions on the map are
/// reported through these hooks and come back as new props on a later cycle.
pub trait StateHooks {
    /// Open the detail view for a provider.
    fn display_provider_information(&mut self, id: &ProviderId);

    /// Add a provider to the highlighted selection.
    fn select_provider(&mut self, id: &ProviderId);

    /// Move the search center, labelled for display in the search box.
    fn set_search_center_coordinates(&mut self, coordinates: LngLat, id: &ProviderId, label: &str);

    /// Switch the side panel to the tab at `index`.
    fn select_tab(&mut self, index: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serializes_camel_case() {
        let provider = Provider::new("p1", "legal", "Legal Aid", LngLat::new(-71.0, 42.3));
        let json = serde_json::to_value(&provider).unwrap();

        assert_eq!(json["id"], "p1");
        assert_eq!(json["typeId"], "legal");
        assert_eq!(json["coordinates"][0], -71.0);
        assert_eq!(json["coordinates"][1], 42.3);
    }

    #[test]
    fn test_props_deserialize_from_host_json() {
        let json = r#"{
            "visibleProviders": [
                {"id": "a", "typeId": "food", "name": "Pantry", "coordinates": [-71.1, 42.4]}
            ],
            "highlightedProviders": ["a"],
            "filters": {"distance": 5.0},
            "search": {
                "coordinates": [-71.0, 42.3],
                "mapCenter": [-71.0, 42.3],
                "currentLocation": "address",
                "zoomToFitKey": 2,
                "flyToProviderKey": 0,
                "flyToProviderId": null,
                "searchKey": 7
            },
            "loadedCategoryIds": ["food"],
            "detailProviderId": null
        }"#;

        let props: MapProps = serde_json::from_str(json).unwrap();
        assert_eq!(props.visible_providers.len(), 1);
        assert_eq!(props.filters.distance, Some(5.0));
        assert_eq!(props.search.current_location, SearchOrigin::Address);
        assert!(props.search.is_user_search());
        assert!(props.is_highlighted(&ProviderId::new("a")));
    }

    #[test]
    fn test_radius_ignores_unusable_distances() {
        let radius = |distance| Filters { distance }.radius();

        assert_eq!(radius(Some(5.0)), Some(5.0));
        assert_eq!(radius(None), None);
        assert_eq!(radius(Some(0.0)), None);
        assert_eq!(radius(Some(-3.0)), None);
        assert_eq!(radius(Some(f64::NAN)), None);
        assert_eq!(radius(Some(f64::INFINITY)), None);
    }

    #[test]
    fn test_selected_and_displayed_requires_both() {
        let mut props = MapProps::new(LngLat::new(0.0, 0.0));
        let id = ProviderId::new("a");

        props.highlighted_providers.push(id.clone());
        assert!(!props.is_selected_and_displayed(&id));

        props.detail_provider_id = Some(id.clone());
        assert!(props.is_selected_and_displayed(&id));

        props.highlighted_providers.clear();
        assert!(!props.is_selected_and_displayed(&id));
    }
}
