//! Reconciliation telemetry.
//!
//! ```text
//! MapView cycle ─────► CycleReport ─────► SyncMetrics ─────► TelemetrySnapshot
//!                      (one cycle)        (running totals)   (point-in-time copy)
//! ```
//!
//! The view is single-threaded, so counters are plain integers rather than
//! atomics.

use crate::camera::CameraIntent;

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// False when the cycle was deferred because the surface was not loaded.
    pub ran: bool,
    pub features_pushed: usize,
    pub layers_created: usize,
    pub overlay_regenerated: bool,
    pub camera: Option<CameraIntent>,
    pub markers_added: usize,
    pub markers_removed: usize,
    /// Descriptions of sub-steps that failed and were skipped.
    pub errors: Vec<String>,
}

impl CycleReport {
    /// Report for a cycle deferred until load.
    pub fn deferred() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Running totals over a view's lifetime.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    cycles: u64,
    deferred_cycles: u64,
    features_pushed: u64,
    layers_created: u64,
    overlays_regenerated: u64,
    camera_moves: u64,
    markers_added: u64,
    markers_removed: u64,
    recovered_errors: u64,
    events_handled: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a cycle report into the totals.
    pub fn record_cycle(&mut self, report: &CycleReport) {
        if !report.ran {
            self.deferred_cycles += 1;
            return;
        }
        self.cycles += 1;
        self.features_pushed += report.features_pushed as u64;
        self.layers_created += report.layers_created as u64;
        self.overlays_regenerated += u64::from(report.overlay_regenerated);
        self.camera_moves += u64::from(report.camera.as_ref().is_some_and(|c| c.moves_camera()));
        self.markers_added += report.markers_added as u64;
        self.markers_removed += report.markers_removed as u64;
        self.recovered_errors += report.errors.len() as u64;
    }

    /// Count a handled user event.
    pub fn event_handled(&mut self) {
        self.events_handled += 1;
    }

    /// Count layers created outside a cycle (during load).
    pub fn record_layers_created(&mut self, count: usize) {
        self.layers_created += count as u64;
    }

    /// Count a camera move issued outside a cycle (cluster clicks).
    pub fn camera_moved(&mut self) {
        self.camera_moves += 1;
    }

    /// Count a failure recovered outside a cycle.
    pub fn error_recovered(&mut self) {
        self.recovered_errors += 1;
    }

    /// Count markers removed outside a cycle (teardown).
    pub fn record_markers_removed(&mut self, count: usize) {
        self.markers_removed += count as u64;
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cycles: self.cycles,
            deferred_cycles: self.deferred_cycles,
            features_pushed: self.features_pushed,
            layers_created: self.layers_created,
            overlays_regenerated: self.overlays_regenerated,
            camera_moves: self.camera_moves,
            markers_added: self.markers_added,
            markers_removed: self.markers_removed,
            recovered_errors: self.recovered_errors,
            events_handled: self.events_handled,
        }
    }
}

/// Copy of [`SyncMetrics`] for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub cycles: u64,
    pub deferred_cycles: u64,
    pub features_pushed: u64,
    pub layers_created: u64,
    pub overlays_regenerated: u64,
    pub camera_moves: u64,
    pub markers_added: u64,
    pub markers_removed: u64,
    pub recovered_errors: u64,
    pub events_handled: u64,
}

impl TelemetrySnapshot {
    /// Selection and overlay markers still on the map.
    pub fn live_markers(&self) -> u64 {
        self.markers_added.saturating_sub(self.markers_removed)
    }
}
