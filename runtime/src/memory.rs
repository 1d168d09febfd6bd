//! In-memory implementations of the storage and lookup ports.
//!
//! Backs the server when no database is configured, and the test harness.
//! Each store is a cheap `Clone` over shared maps, so a caller can keep a
//! handle for inspection while the runtime owns another behind `Arc<dyn ...>`.

use bookings_core::{
    Booking, BookingId, BookingStore, DomainError, Notification, NotificationCounts, NotificationId,
    NotificationStore, Page, Payment, PaymentId, PaymentStatus, PaymentStore, Refund, Result,
    ServiceCatalog, ServiceId, ServiceListing, StoreFuture, UserDirectory, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| DomainError::Storage("lock poisoned".to_string()))
}

/// Bookings kept in a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.bookings).map_or(0, |b| b.len())
    }

    /// Whether no bookings are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BookingStore for InMemoryBookingStore {
    fn insert(&self, booking: &Booking) -> StoreFuture<'_, ()> {
        let booking = booking.clone();
        Box::pin(async move {
            let mut bookings = lock(&self.bookings)?;
            if bookings.contains_key(&booking.id) {
                return Err(DomainError::Conflict(format!("booking {} already exists", booking.id)));
            }
            bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn get(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move { Ok(lock(&self.bookings)?.get(&id).cloned()) })
    }

    fn update(&self, booking: &Booking) -> StoreFuture<'_, bool> {
        let booking = booking.clone();
        Box::pin(async move {
            let mut bookings = lock(&self.bookings)?;
            match bookings.get_mut(&booking.id) {
                Some(existing) => {
                    *existing = booking;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete(&self, id: BookingId) -> StoreFuture<'_, bool> {
        Box::pin(async move { Ok(lock(&self.bookings)?.remove(&id).is_some()) })
    }

    fn list_for_party(&self, user: UserId) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let mut found: Vec<Booking> = lock(&self.bookings)?
                .values()
                .filter(|b| b.is_party(user))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found)
        })
    }
}

#[derive(Debug, Default)]
struct PaymentTables {
    payments: HashMap<PaymentId, Payment>,
    refunds: Vec<Refund>,
}

/// Payments and refunds with the same uniqueness rules as the SQL schema.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    tables: Arc<Mutex<PaymentTables>>,
}

impl InMemoryPaymentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded payment.
    #[must_use]
    pub fn payments(&self) -> Vec<Payment> {
        lock(&self.tables).map_or_else(|_| Vec::new(), |t| t.payments.values().cloned().collect())
    }

    /// Every recorded refund, oldest first.
    #[must_use]
    pub fn refunds(&self) -> Vec<Refund> {
        lock(&self.tables).map_or_else(|_| Vec::new(), |t| t.refunds.clone())
    }
}

impl PaymentStore for InMemoryPaymentStore {
    fn insert_payment(&self, payment: &Payment) -> StoreFuture<'_, ()> {
        let payment = payment.clone();
        Box::pin(async move {
            let mut tables = lock(&self.tables)?;
            if tables.payments.values().any(|p| p.booking_id == payment.booking_id) {
                return Err(DomainError::Conflict(format!(
                    "booking {} already has a payment",
                    payment.booking_id
                )));
            }
            if tables
                .payments
                .values()
                .any(|p| p.transaction_id == payment.transaction_id)
            {
                return Err(DomainError::Conflict(format!(
                    "transaction {} already recorded",
                    payment.transaction_id
                )));
            }
            tables.payments.insert(payment.id, payment);
            Ok(())
        })
    }

    fn get_payment(&self, id: PaymentId) -> StoreFuture<'_, Option<Payment>> {
        Box::pin(async move { Ok(lock(&self.tables)?.payments.get(&id).cloned()) })
    }

    fn get_payment_by_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Payment>> {
        Box::pin(async move {
            Ok(lock(&self.tables)?
                .payments
                .values()
                .find(|p| p.booking_id == booking_id)
                .cloned())
        })
    }

    fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        failure_reason: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tables = lock(&self.tables)?;
            let Some(payment) = tables.payments.get_mut(&id) else {
                return Ok(false);
            };
            payment.status = status;
            payment.failure_reason = failure_reason;
            payment.updated_at = updated_at;
            Ok(true)
        })
    }

    fn mark_refunded(&self, id: PaymentId, updated_at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tables = lock(&self.tables)?;
            match tables.payments.get_mut(&id) {
                Some(payment) if payment.status == PaymentStatus::Completed => {
                    payment.status = PaymentStatus::Refunded;
                    payment.updated_at = updated_at;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn insert_refund(&self, refund: &Refund) -> StoreFuture<'_, ()> {
        let refund = refund.clone();
        Box::pin(async move {
            lock(&self.tables)?.refunds.push(refund);
            Ok(())
        })
    }

    fn list_refunds(&self, payment_id: PaymentId) -> StoreFuture<'_, Vec<Refund>> {
        Box::pin(async move {
            Ok(lock(&self.tables)?
                .refunds
                .iter()
                .filter(|r| r.payment_id == payment_id)
                .cloned()
                .collect())
        })
    }
}

/// Notifications kept in insertion order.
///
/// [`fail_next_inserts`](Self::fail_next_inserts) makes upcoming inserts fail
/// with a transient storage error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationStore {
    rows: Arc<Mutex<Vec<Notification>>>,
    failing_inserts: Arc<AtomicUsize>,
}

impl InMemoryNotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` insert attempts.
    pub fn fail_next_inserts(&self, n: usize) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// Number of stored notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.rows).map_or(0, |r| r.len())
    }

    /// Whether no notifications are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored notification for `user`, oldest first.
    #[must_use]
    pub fn for_user(&self, user: UserId) -> Vec<Notification> {
        lock(&self.rows).map_or_else(
            |_| Vec::new(),
            |rows| rows.iter().filter(|n| n.user_id == user).cloned().collect(),
        )
    }

    fn newest_first(&self, user: UserId, unread_only: bool) -> Result<Vec<Notification>> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .iter()
            .rev()
            .filter(|n| n.user_id == user && !(unread_only && n.is_read))
            .cloned()
            .collect())
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn insert(&self, notification: &Notification) -> StoreFuture<'_, ()> {
        let notification = notification.clone();
        Box::pin(async move {
            let failing = self
                .failing_inserts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DomainError::Storage("notification store unavailable".to_string()));
            }
            let mut rows = lock(&self.rows)?;
            // Keep rows ordered by creation time; ties keep insertion order.
            let at = rows.partition_point(|n| n.created_at <= notification.created_at);
            rows.insert(at, notification);
            Ok(())
        })
    }

    fn list(&self, user: UserId, page: Page) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            Ok(self
                .newest_first(user, false)?
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect())
        })
    }

    fn list_unread(&self, user: UserId) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(async move { self.newest_first(user, true) })
    }

    fn mark_read(&self, id: NotificationId, user: UserId, at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut rows = lock(&self.rows)?;
            let Some(row) = rows.iter_mut().find(|n| n.id == id && n.user_id == user) else {
                return Ok(false);
            };
            if !row.is_read {
                row.is_read = true;
                row.read_at = Some(at);
            }
            Ok(true)
        })
    }

    fn mark_all_read(&self, user: UserId, at: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut rows = lock(&self.rows)?;
            let mut changed = 0;
            for row in rows.iter_mut().filter(|n| n.user_id == user && !n.is_read) {
                row.is_read = true;
                row.read_at = Some(at);
                changed += 1;
            }
            Ok(changed)
        })
    }

    fn delete(&self, id: NotificationId, user: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut rows = lock(&self.rows)?;
            let before = rows.len();
            rows.retain(|n| !(n.id == id && n.user_id == user));
            Ok(rows.len() != before)
        })
    }

    fn counts(&self, user: UserId) -> StoreFuture<'_, NotificationCounts> {
        Box::pin(async move {
            let rows = lock(&self.rows)?;
            let mine = rows.iter().filter(|n| n.user_id == user);
            let (total, unread) = mine.fold((0, 0), |(t, u), n| (t + 1, u + u64::from(!n.is_read)));
            Ok(NotificationCounts { total, unread })
        })
    }
}

/// A fixed service catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    services: Arc<Mutex<HashMap<ServiceId, ServiceListing>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a service.
    pub fn add(&self, service: ServiceListing) {
        if let Ok(mut services) = lock(&self.services) {
            services.insert(service.id, service);
        }
    }

    /// Removes a service.
    pub fn remove(&self, id: ServiceId) {
        if let Ok(mut services) = lock(&self.services) {
            services.remove(&id);
        }
    }
}

impl ServiceCatalog for InMemoryCatalog {
    fn get_service(&self, id: ServiceId) -> StoreFuture<'_, Option<ServiceListing>> {
        Box::pin(async move { Ok(lock(&self.services)?.get(&id).cloned()) })
    }
}

/// A fixed user registry keyed by id and email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<Mutex<HashMap<UserId, String>>>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with the given id and email.
    pub fn add(&self, id: UserId, email: &str) {
        if let Ok(mut users) = lock(&self.users) {
            users.insert(id, email.to_ascii_lowercase());
        }
    }

    /// Removes a user.
    pub fn remove(&self, id: UserId) {
        if let Ok(mut users) = lock(&self.users) {
            users.remove(&id);
        }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn resolve<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(async move {
            let users = lock(&self.users)?;
            if let Ok(id) = identity.parse::<UserId>() {
                return Ok(users.contains_key(&id).then_some(id));
            }
            let email = identity.trim().to_ascii_lowercase();
            Ok(users
                .iter()
                .find(|(_, e)| **e == email)
                .map(|(id, _)| *id))
        })
    }
}
