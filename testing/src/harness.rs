//! A complete in-process booking system over in-memory stores.

use crate::fixtures::Fixtures;
use crate::mocks::{FixedClock, test_clock};
use crate::stores::{
    InMemoryBookingStore, InMemoryCatalog, InMemoryNotificationStore, InMemoryPaymentStore,
    InMemoryUserDirectory,
};
use bookings_core::{Booking, Notification, Result, UserId};
use bookings_runtime::retry::RetryPolicy;
use bookings_runtime::{BookingSystem, InMemoryBroker, Stores, SystemConfig};
use std::sync::Arc;
use std::time::Duration;

/// Wired system plus direct handles on every store for assertions.
///
/// Must be created inside a tokio runtime: the outbox worker is spawned on
/// construction.
pub struct TestHarness {
    /// Booking rows
    pub bookings: InMemoryBookingStore,
    /// Payment and refund rows
    pub payments: InMemoryPaymentStore,
    /// Notification rows
    pub notifications: InMemoryNotificationStore,
    /// Service catalog
    pub catalog: InMemoryCatalog,
    /// User directory
    pub users: InMemoryUserDirectory,
    /// Subscriber registry
    pub broker: InMemoryBroker,
    /// Shared clock
    pub clock: FixedClock,
    /// Registered users and service
    pub fixtures: Fixtures,
    /// The runtime components
    pub system: BookingSystem,
}

impl TestHarness {
    /// Harness with a forced payment failure rate, fast retries and a short heartbeat.
    #[must_use]
    pub fn with_failure_rate(failure_rate: f64) -> Self {
        Self::new(SystemConfig {
            failure_rate,
            heartbeat: Duration::from_millis(50),
            retry: RetryPolicy::builder()
                .initial_delay(Duration::from_millis(1))
                .build(),
            ..SystemConfig::default()
        })
    }

    /// Harness with explicit runtime settings.
    #[must_use]
    pub fn new(config: SystemConfig) -> Self {
        Self::with_stores(config, |stores| stores)
    }

    /// Harness whose runtime sees the stores returned by `wrap`.
    ///
    /// `wrap` receives the in-memory stores the harness fields point at, so a
    /// wrapper that delegates to them keeps every assertion helper working.
    #[must_use]
    pub fn with_stores(config: SystemConfig, wrap: impl FnOnce(Stores) -> Stores) -> Self {
        let bookings = InMemoryBookingStore::new();
        let payments = InMemoryPaymentStore::new();
        let notifications = InMemoryNotificationStore::new();
        let catalog = InMemoryCatalog::new();
        let users = InMemoryUserDirectory::new();
        let broker = InMemoryBroker::new();
        let clock = test_clock();
        let fixtures = Fixtures::install(&users, &catalog);

        let stores = Stores {
            bookings: Arc::new(bookings.clone()),
            payments: Arc::new(payments.clone()),
            notifications: Arc::new(notifications.clone()),
            catalog: Arc::new(catalog.clone()),
            users: Arc::new(users.clone()),
        };
        let (system, worker) =
            BookingSystem::build(wrap(stores), Arc::new(broker.clone()), Arc::new(clock.clone()), config);
        tokio::spawn(worker.run());

        Self {
            bookings,
            payments,
            notifications,
            catalog,
            users,
            broker,
            clock,
            fixtures,
            system,
        }
    }

    /// Books the fixture service as the fixture customer.
    ///
    /// # Errors
    ///
    /// Whatever the saga returns.
    pub async fn create_booking(&self) -> Result<Booking> {
        self.system
            .orchestrator
            .create_booking(&self.fixtures.customer.to_string(), self.fixtures.booking_request())
            .await
    }

    /// Waits until `user` has at least `count` stored notifications and
    /// returns them oldest first. Gives up after two seconds.
    pub async fn wait_for_notifications(&self, user: UserId, count: usize) -> Vec<Notification> {
        for _ in 0..200 {
            let found = self.notifications.for_user(user);
            if found.len() >= count {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifications.for_user(user)
    }
}
