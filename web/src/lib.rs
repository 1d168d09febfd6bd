//! HTTP surface for the booking platform.
//!
//! Thin axum handlers over [`BookingSystem`](bookings_runtime::BookingSystem):
//! extract the caller and payload, call the runtime, map the outcome to a
//! status code. All business rules live in the runtime.
//!
//! # Routes
//!
//! ```text
//! GET    /health                          liveness
//! GET    /health/ready                    outbox worker + connection report
//! GET    /metrics                         Prometheus scrape page
//!
//! GET    /api/bookings                    caller's bookings
//! POST   /api/bookings                    booking saga
//! GET    /api/bookings/:id
//! PUT    /api/bookings/:id
//! DELETE /api/bookings/:id
//!
//! POST   /api/payments/process
//! POST   /api/payments/refund
//! GET    /api/payments/:id
//! GET    /api/payments/:id/refunds
//! GET    /api/payments/booking/:booking_id
//!
//! GET    /api/notifications               ?limit=&offset=
//! POST   /api/notifications
//! GET    /api/notifications/unread
//! GET    /api/notifications/count
//! GET    /api/notifications/stream        server-sent events
//! PUT    /api/notifications/read-all
//! PUT    /api/notifications/:id/read
//! DELETE /api/notifications/:id
//! ```
//!
//! Callers identify themselves with the `X-User-Id` header.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use extractors::{CorrelationId, Requester, USER_ID_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use handlers::{bookings, health, notifications, payments};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// The complete application router.
pub fn router(state: AppState) -> Router {
    let bookings = Router::new()
        .route("/", get(bookings::list_bookings).post(bookings::create_booking))
        .route(
            "/:id",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        );

    let payments = Router::new()
        .route("/process", post(payments::process_payment))
        .route("/refund", post(payments::process_refund))
        .route("/booking/:booking_id", get(payments::get_payment_by_booking))
        .route("/:id", get(payments::get_payment))
        .route("/:id/refunds", get(payments::list_refunds));

    let notifications = Router::new()
        .route(
            "/",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route("/unread", get(notifications::list_unread))
        .route("/count", get(notifications::counts))
        .route("/stream", get(notifications::stream))
        .route("/read-all", put(notifications::mark_all_read))
        .route("/:id/read", put(notifications::mark_read))
        .route("/:id", axum::routing::delete(notifications::delete_notification));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        .nest("/api/bookings", bookings)
        .nest("/api/payments", payments)
        .nest("/api/notifications", notifications)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
