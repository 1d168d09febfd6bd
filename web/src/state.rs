//! Application state shared across handlers.

use bookings_runtime::BookingSystem;
use bookings_runtime::metrics::PrometheusHandle;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runtime components
    pub system: BookingSystem,
    /// Renders `/metrics`; `None` when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State without a metrics endpoint.
    #[must_use]
    pub const fn new(system: BookingSystem) -> Self {
        Self {
            system,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
