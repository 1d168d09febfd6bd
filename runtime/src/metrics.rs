//! Prometheus metrics for the booking saga, payments and notification delivery.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookings_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let _text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics_exporter_prometheus::PrometheusHandle;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus a handle for rendering the scrape page.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server advertised at `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (another server in the same process) is
    /// tolerated and leaves [`MetricsServer::render`] returning `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the metrics endpoint is served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "bookings_created_total",
        "Booking saga outcomes, labelled confirmed or rolled_back"
    );
    describe_histogram!(
        "booking_saga_duration_seconds",
        "Time from saga start to its terminal state"
    );
    describe_counter!(
        "payments_processed_total",
        "Simulated payments, labelled by resulting status"
    );
    describe_counter!(
        "refunds_processed_total",
        "Refunds issued, labelled requested or reversal"
    );
    describe_counter!(
        "notifications_published_total",
        "Notifications accepted by the broadcaster"
    );
    describe_counter!(
        "notification_deliveries_total",
        "Live deliveries per channel, labelled delivered or dropped"
    );
    describe_counter!(
        "notification_persist_failures_total",
        "Notifications that could not be stored after retries"
    );
    describe_gauge!(
        "realtime_connections",
        "Currently open realtime connections"
    );
}

/// Booking saga metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a saga that reached CONFIRMED.
    pub fn record_confirmed(duration: Duration) {
        counter!("bookings_created_total", "outcome" => "confirmed").increment(1);
        histogram!("booking_saga_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a saga that was compensated.
    pub fn record_rolled_back(duration: Duration) {
        counter!("bookings_created_total", "outcome" => "rolled_back").increment(1);
        histogram!("booking_saga_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Payment gateway metrics recorder.
pub struct PaymentMetrics;

impl PaymentMetrics {
    /// Record a processed payment by status.
    pub fn record_payment(status: &'static str) {
        counter!("payments_processed_total", "status" => status).increment(1);
    }

    /// Record a refund; `kind` is `requested` or `reversal`.
    pub fn record_refund(kind: &'static str) {
        counter!("refunds_processed_total", "kind" => kind).increment(1);
    }
}

/// Notification fan-out metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a notification accepted for delivery.
    pub fn record_published() {
        counter!("notifications_published_total").increment(1);
    }

    /// Record the outcome of one publish across a user's channels.
    pub fn record_deliveries(delivered: usize, dropped: usize) {
        counter!("notification_deliveries_total", "result" => "delivered").increment(delivered as u64);
        counter!("notification_deliveries_total", "result" => "dropped").increment(dropped as u64);
    }

    /// Record a notification lost because it could not be stored.
    pub fn record_persist_failure() {
        counter!("notification_persist_failures_total").increment(1);
    }
}

/// Realtime transport metrics recorder.
pub struct RealtimeMetrics;

impl RealtimeMetrics {
    /// A connection opened.
    pub fn record_open() {
        gauge!("realtime_connections").increment(1.0);
    }

    /// A connection closed.
    pub fn record_close() {
        gauge!("realtime_connections").decrement(1.0);
    }
}
