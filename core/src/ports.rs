//! Storage and lookup ports.
//!
//! Every collaborator the runtime talks to is expressed as a dyn-compatible
//! trait returning boxed futures, so implementations can be swapped behind an
//! `Arc<dyn ...>`: the in-memory stores in `bookings-runtime` and the sqlx
//! adapters in `bookings-postgres` implement the same contracts.
//!
//! Implementations translate backend failures at this boundary:
//! uniqueness violations become [`DomainError::Conflict`], everything else
//! becomes [`DomainError::Storage`].
//!
//! [`DomainError::Conflict`]: crate::DomainError::Conflict
//! [`DomainError::Storage`]: crate::DomainError::Storage

use crate::booking::Booking;
use crate::error::Result;
use crate::ids::{BookingId, NotificationId, PaymentId, ServiceId, UserId};
use crate::notification::{Notification, NotificationCounts, Page};
use crate::payment::{Payment, PaymentStatus, Refund};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every port method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persistence of bookings.
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking.
    fn insert(&self, booking: &Booking) -> StoreFuture<'_, ()>;

    /// Loads a booking by id.
    fn get(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// Overwrites an existing booking. Returns `false` if it no longer exists.
    fn update(&self, booking: &Booking) -> StoreFuture<'_, bool>;

    /// Deletes a booking. Returns `false` if it did not exist.
    fn delete(&self, id: BookingId) -> StoreFuture<'_, bool>;

    /// Bookings where `user` is customer or provider, newest first.
    fn list_for_party(&self, user: UserId) -> StoreFuture<'_, Vec<Booking>>;
}

/// Persistence of payments and their refunds.
pub trait PaymentStore: Send + Sync {
    /// Inserts a payment.
    ///
    /// Fails with `Conflict` if the booking already has a payment or the
    /// transaction id is taken.
    fn insert_payment(&self, payment: &Payment) -> StoreFuture<'_, ()>;

    /// Loads a payment by id.
    fn get_payment(&self, id: PaymentId) -> StoreFuture<'_, Option<Payment>>;

    /// Loads the payment recorded for a booking.
    fn get_payment_by_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Payment>>;

    /// Sets status and failure reason. Returns `false` if the payment is absent.
    fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        failure_reason: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool>;

    /// Moves a `completed` payment to `refunded` in one step.
    ///
    /// Returns `false`, changing nothing, when the payment is absent or in
    /// any other status. Concurrent callers on the same payment see exactly
    /// one `true`.
    fn mark_refunded(&self, id: PaymentId, updated_at: DateTime<Utc>) -> StoreFuture<'_, bool>;

    /// Inserts a refund.
    fn insert_refund(&self, refund: &Refund) -> StoreFuture<'_, ()>;

    /// Refunds issued against a payment, oldest first.
    fn list_refunds(&self, payment_id: PaymentId) -> StoreFuture<'_, Vec<Refund>>;
}

/// Persistence of notifications. Pure data access.
pub trait NotificationStore: Send + Sync {
    /// Inserts a notification.
    fn insert(&self, notification: &Notification) -> StoreFuture<'_, ()>;

    /// A user's notifications, newest first.
    fn list(&self, user: UserId, page: Page) -> StoreFuture<'_, Vec<Notification>>;

    /// A user's unread notifications, newest first.
    fn list_unread(&self, user: UserId) -> StoreFuture<'_, Vec<Notification>>;

    /// Marks one notification owned by `user` as read.
    ///
    /// `read_at` is only set on the first read. Returns `false` if no
    /// notification with that id belongs to `user`.
    fn mark_read(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool>;

    /// Marks every unread notification of `user` as read. Returns how many changed.
    fn mark_all_read(&self, user: UserId, at: DateTime<Utc>) -> StoreFuture<'_, u64>;

    /// Deletes a notification owned by `user`.
    fn delete(&self, id: NotificationId, user: UserId) -> StoreFuture<'_, bool>;

    /// Total and unread counts for `user`.
    fn counts(&self, user: UserId) -> StoreFuture<'_, NotificationCounts>;
}

/// A bookable service as seen by the booking saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListing {
    /// Service id
    pub id: ServiceId,
    /// Provider offering it
    pub provider_id: UserId,
    /// Display title
    pub title: String,
    /// Price per booking
    pub price: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Length of one booking
    pub duration_minutes: i32,
}

/// Read-only view of the external service catalog.
pub trait ServiceCatalog: Send + Sync {
    /// Looks up a service.
    fn get_service(&self, id: ServiceId) -> StoreFuture<'_, Option<ServiceListing>>;
}

/// Read-only view of the external user registry.
pub trait UserDirectory: Send + Sync {
    /// Resolves a user id or an email address to the canonical user id.
    fn resolve<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<UserId>>;
}
