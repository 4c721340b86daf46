//! Core geometry value types.

use serde::{Deserialize, Serialize};

/// A geographic position as longitude/latitude in degrees.
///
/// Serialized as a `[lng, lat]` pair, the order map data sources expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// Create a position from longitude and latitude.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

impl std::fmt::Display for LngLat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lng, self.lat)
    }
}

/// A pixel position on the map canvas, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel insets reserved around the canvas edges.
///
/// The left inset is large because the provider list panel overlays the
/// left side of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: 100.0,
            bottom: 100.0,
            left: 450.0,
            right: 100.0,
        }
    }
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Minimum (southernmost) latitude
    pub min_lat: f64,
    /// Maximum (northernmost) latitude
    pub max_lat: f64,
    /// Minimum (westernmost) longitude
    pub min_lon: f64,
    /// Maximum (easternmost) longitude
    pub max_lon: f64,
}

impl GeoBounds {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Create a bounding box from a single point.
    pub fn from_point(p: LngLat) -> Self {
        Self {
            min_lat: p.lat,
            max_lat: p.lat,
            min_lon: p.lng,
            max_lon: p.lng,
        }
    }

    /// Smallest box containing every point, `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LngLat>,
    {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for p in iter {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// Expand this bounding box to include a point.
    pub fn expand(&mut self, p: LngLat) {
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lat = self.max_lat.max(p.lat);
        self.min_lon = self.min_lon.min(p.lng);
        self.max_lon = self.max_lon.max(p.lng);
    }

    /// Whether the point lies inside or on the edge of the box.
    pub fn contains(&self, p: LngLat) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (self.min_lon..=self.max_lon).contains(&p.lng)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Get the width of the bounds in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Get the height of the bounds in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}
