//! Map view error types.

use thiserror::Error;

use crate::surface::SurfaceError;

/// Errors surfaced by the map view.
///
/// Only initialization failures are returned to the host. Failures inside a
/// reconciliation cycle are logged and counted in the cycle report instead,
/// so one bad sub-step never blocks the next cycle.
#[derive(Debug, Error)]
pub enum MapError {
    /// An icon image failed to load. Fatal: no partial icon set is rendered.
    #[error("Failed to load icon {name}: {source}")]
    IconLoad {
        name: String,
        #[source]
        source: SurfaceError,
    },

    /// Icon bytes could not be decoded.
    #[error("Failed to decode icon {name}: {source}")]
    IconDecode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    /// Operation requires the surface's load signal.
    #[error("Map surface has not finished loading")]
    NotLoaded,

    /// The view was already loaded.
    #[error("Map surface is already loaded")]
    AlreadyLoaded,

    /// A surface call failed.
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_icon_load_display_and_source() {
        let err = MapError::IconLoad {
            name: "legalicon".to_string(),
            source: SurfaceError::ImageLoad {
                url: "legal.png".to_string(),
                reason: "404".to_string(),
            },
        };

        assert!(err.to_string().contains("legalicon"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_surface_error() {
        let err: MapError = SurfaceError::MissingSource("displayData".to_string()).into();
        assert!(matches!(err, MapError::Surface(_)));
        assert_eq!(err.to_string(), "Surface error: Source not found: displayData");
    }

    #[test]
    fn test_config_error_display() {
        let err = MapError::Config("bad zoom".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad zoom"));
    }
}
