//! Icon images registered with the surface before the first cycle.
//!
//! Every category layer draws the image named `"{category}icon"`; the
//! cluster and highlight layers use fixed names. All icons must load before
//! the view reports itself loaded.

use image::RgbaImage;

use crate::error::MapError;
use crate::model::CategoryId;

/// Icon suffix appended to category and layer names.
pub const ICON_SUFFIX: &str = "icon";

/// Icon of a cluster with no highlighted members.
pub const CLUSTER_ICON: &str = "clusters-multiicon";

/// Icon of a cluster containing highlighted members.
pub const CLUSTER_HIGHLIGHTED_ICON: &str = "clusters-multi-highlightedicon";

/// Image name for a category or layer.
pub fn icon_name(base: &str) -> String {
    format!("{}{}", base, ICON_SUFFIX)
}

/// Image name for a category's provider pins.
pub fn category_icon(category: &CategoryId) -> String {
    icon_name(category.as_str())
}

/// One image to register: surface name and source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpec {
    pub name: String,
    pub url: String,
}

/// The images a view needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconSet {
    icons: Vec<IconSpec>,
}

impl IconSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category pin icon (registered as `"{category}icon"`).
    pub fn with_category(mut self, category: &str, url: impl Into<String>) -> Self {
        self.icons.push(IconSpec {
            name: icon_name(category),
            url: url.into(),
        });
        self
    }

    /// Add an icon under an exact name.
    pub fn with_named(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.icons.push(IconSpec {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &IconSpec> {
        self.icons.iter()
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

/// Decode PNG or JPEG bytes into an RGBA icon.
///
/// Provided for surface implementations whose `load_image` fetches raw bytes.
pub fn decode_icon(name: &str, bytes: &[u8]) -> Result<RgbaImage, MapError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| MapError::IconDecode {
            name: name.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_icon_names() {
        assert_eq!(icon_name("highlighted"), "highlightedicon");
        assert_eq!(category_icon(&CategoryId::new("legal")), "legalicon");
    }

    #[test]
    fn test_icon_set_builder() {
        let set = IconSet::new()
            .with_category("legal", "assets/legal.png")
            .with_named(CLUSTER_ICON, "assets/cluster.png");

        let names: Vec<_> = set.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["legalicon", "clusters-multiicon"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_decode_icon_png() {
        let source = RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_icon("test", &bytes).unwrap();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(decoded.get_pixel(1, 1), &image::Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_decode_icon_rejects_garbage() {
        let err = decode_icon("broken", b"not an image").unwrap_err();
        assert!(matches!(err, MapError::IconDecode { ref name, .. } if name == "broken"));
    }
}
