//! Marker lifecycle management.
//!
//! The surface cannot be asked which markers it is showing, so every marker
//! the view places is recorded here under a `(role, identity)` key. Each add
//! stores the returned handle; each remove evicts by key and hands the handle
//! back to the surface. A key never maps to two live markers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::geo::{LngLat, ProviderIndex};
use crate::model::ProviderId;
use crate::surface::{MapSurface, MarkerElement, MarkerHandle, MarkerSpec, SurfaceError};

/// Identity of a placed marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKey {
    /// Pin at the search center.
    CenterPin,
    /// Radius label, by position in ascending radius order.
    DistanceLabel(usize),
    /// Animated marker over a highlighted provider.
    Selection(ProviderId),
}

impl MarkerKey {
    /// Whether the marker belongs to the distance overlay.
    pub fn is_distance(&self) -> bool {
        matches!(self, MarkerKey::CenterPin | MarkerKey::DistanceLabel(_))
    }
}

/// A marker currently on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedMarker {
    pub handle: MarkerHandle,
    pub position: LngLat,
}

/// Outcome of a selection reconciliation.
#[derive(Debug, Default)]
pub struct SelectionDiff {
    pub added: Vec<ProviderId>,
    /// Removed markers with the handles they had on the surface.
    pub removed: Vec<(ProviderId, MarkerHandle)>,
    pub failed: Vec<(ProviderId, SurfaceError)>,
}

/// Registry of every marker the view has placed.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: BTreeMap<MarkerKey, PlacedMarker>,
    by_handle: HashMap<MarkerHandle, MarkerKey>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a marker under `key`, replacing any marker already there.
    pub fn place<S: MapSurface>(
        &mut self,
        surface: &mut S,
        key: MarkerKey,
        spec: &MarkerSpec,
    ) -> Result<MarkerHandle, SurfaceError> {
        self.remove(surface, &key);
        let handle = surface.add_marker(spec)?;
        self.by_handle.insert(handle, key.clone());
        self.entries.insert(
            key,
            PlacedMarker {
                handle,
                position: spec.position,
            },
        );
        Ok(handle)
    }

    /// Remove the marker under `key`. Returns whether one existed.
    pub fn remove<S: MapSurface>(&mut self, surface: &mut S, key: &MarkerKey) -> bool {
        match self.entries.remove(key) {
            Some(placed) => {
                self.by_handle.remove(&placed.handle);
                surface.remove_marker(placed.handle);
                true
            }
            None => false,
        }
    }

    /// Bring selection markers in line with the highlighted set.
    ///
    /// Ids that do not resolve to a visible provider get no marker. Markers
    /// for ids no longer highlighted are removed. Placement failures are
    /// reported and leave nothing behind.
    pub fn reconcile_selection<S: MapSurface>(
        &mut self,
        surface: &mut S,
        highlighted: &[ProviderId],
        index: &ProviderIndex<'_>,
    ) -> SelectionDiff {
        let wanted: BTreeSet<&ProviderId> = highlighted
            .iter()
            .filter(|id| index.contains_key(id))
            .collect();

        let stale: Vec<(ProviderId, MarkerHandle)> = self
            .entries
            .iter()
            .filter_map(|(key, placed)| match key {
                MarkerKey::Selection(id) if !wanted.contains(id) => Some((id.clone(), placed.handle)),
                _ => None,
            })
            .collect();

        let mut diff = SelectionDiff::default();
        for (id, handle) in stale {
            self.remove(surface, &MarkerKey::Selection(id.clone()));
            diff.removed.push((id, handle));
        }

        for id in wanted {
            let key = MarkerKey::Selection(id.clone());
            if self.entries.contains_key(&key) {
                continue;
            }
            let Some(provider) = index.get(id) else {
                continue;
            };
            let spec = MarkerSpec {
                position: provider.coordinates,
                element: MarkerElement::Selection {
                    provider_id: provider.id.clone(),
                    category: provider.type_id.clone(),
                    name: provider.name.clone(),
                },
            };
            match self.place(surface, key, &spec) {
                Ok(_) => diff.added.push(id.clone()),
                Err(e) => {
                    warn!(provider = %id, error = %e, "Selection marker rejected");
                    diff.failed.push((id.clone(), e));
                }
            }
        }

        if !diff.added.is_empty() || !diff.removed.is_empty() {
            debug!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                live = self.selection_count(),
                "Selection markers reconciled"
            );
        }
        diff
    }

    /// Remove the center pin and every radius label. Safe when none exist.
    pub fn clear_distance_markers<S: MapSurface>(&mut self, surface: &mut S) -> usize {
        let keys: Vec<MarkerKey> = self
            .entries
            .keys()
            .filter(|k| k.is_distance())
            .cloned()
            .collect();
        for key in &keys {
            self.remove(surface, key);
        }
        keys.len()
    }

    /// Remove every marker. Used at teardown.
    pub fn clear<S: MapSurface>(&mut self, surface: &mut S) -> usize {
        let count = self.entries.len();
        for placed in self.entries.values() {
            surface.remove_marker(placed.handle);
        }
        self.entries.clear();
        self.by_handle.clear();
        count
    }

    /// Key of the marker owning `handle`.
    pub fn key_for(&self, handle: MarkerHandle) -> Option<&MarkerKey> {
        self.by_handle.get(&handle)
    }

    pub fn get(&self, key: &MarkerKey) -> Option<&PlacedMarker> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &MarkerKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live selection markers.
    pub fn selection_count(&self) -> usize {
        self.entries
            .keys()
            .filter(|k| matches!(k, MarkerKey::Selection(_)))
            .count()
    }

    /// Number of live distance overlay markers.
    pub fn distance_count(&self) -> usize {
        self.entries.keys().filter(|k| k.is_distance()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
