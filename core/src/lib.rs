//! # Bookings Core
//!
//! Domain types and ports for the booking platform.
//!
//! A booking only becomes `CONFIRMED` as a direct consequence of its payment
//! completing; every state change fans out as a notification to the parties
//! involved. This crate holds the vocabulary for that flow and the traits the
//! runtime depends on. It performs no I/O.
//!
//! ## Modules
//!
//! - [`booking`], [`payment`], [`notification`]: records and requests
//! - [`ids`]: typed identifiers
//! - [`ports`]: storage, catalog and user-directory traits
//! - [`broker`]: subscriber registry abstraction for live delivery
//! - [`error`]: [`DomainError`] and the crate [`Result`]
//! - [`environment`]: injected dependencies such as the [`Clock`](environment::Clock)

pub mod booking;
pub mod broker;
pub mod error;
pub mod ids;
pub mod notification;
pub mod payment;
pub mod ports;

pub use booking::{Booking, BookingPatch, BookingStatus, CreateBookingRequest};
pub use broker::{ConnectionId, NotificationBroker};
pub use error::{DomainError, Result};
pub use ids::{BookingId, NotificationId, PaymentId, RefundId, ServiceId, UserId};
pub use notification::{Notification, NotificationCounts, NotificationDraft, NotificationType, Page};
pub use payment::{
    CardSummary, Payment, PaymentMethod, PaymentRequest, PaymentStatus, ProcessPaymentRequest,
    Refund, RefundRequest, RefundStatus,
};
pub use ports::{
    BookingStore, NotificationStore, PaymentStore, ServiceCatalog, ServiceListing, StoreFuture,
    UserDirectory,
};

/// Environment traits for dependency injection.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use bookings_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
