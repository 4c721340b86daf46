//! ProviderMap - Map view synchronization for service-provider search
//!
//! This library keeps an imperative map rendering surface (sources, layers,
//! markers, popups, camera) in step with declarative application state: the
//! visible providers, which of them are highlighted, the active distance
//! filter, and the current search.
//!
//! # Design
//!
//! **Desired state is computed, then applied.**
//!
//! - **Surface**: a capability trait ([`surface::MapSurface`]) with no diffing
//!   of its own
//! - **Plan**: pure functions derive features, overlays, and a single
//!   [`camera::CameraIntent`] from the previous and current props
//! - **Apply**: [`view::MapView`] runs a fixed per-cycle sequence and keeps
//!   every marker handle in an owned registry
//!
//! # Example
//!
//! ```ignore
//! use providermap::{IconSet, MapProps, MapView, MapViewConfig, RecordingSurface};
//!
//! let mut view = MapView::mount(RecordingSurface::default(), hooks, props, MapViewConfig::default())?;
//! view.on_load(&IconSet::new().with_category("legal", "assets/legal.png")).await?;
//!
//! let report = view.update(next_props);
//! assert!(report.is_clean());
//! ```

pub mod camera;
pub mod config;
pub mod distance;
pub mod error;
pub mod geo;
pub mod icons;
pub mod interaction;
pub mod logging;
pub mod markers;
pub mod model;
pub mod provision;
pub mod surface;
pub mod telemetry;
pub mod view;

pub use camera::{derive_intent, CameraIntent, ViewSnapshot};
pub use config::MapViewConfig;
pub use error::MapError;
pub use geo::{GeoBounds, LngLat};
pub use icons::IconSet;
pub use model::{
    CategoryId, Filters, MapProps, Provider, ProviderId, SearchOrigin, SearchState, StateHooks,
};
pub use surface::{MapEvent, MapSurface, RecordingSurface, SurfaceError};
pub use telemetry::{CycleReport, TelemetrySnapshot};
pub use view::{MapView, Teardown};
