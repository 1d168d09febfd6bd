//! Wiring of the runtime components over a set of stores.

use crate::broadcaster::{NotificationBroadcaster, OutboxWorker};
use crate::orchestrator::BookingOrchestrator;
use crate::payment_gateway::{DEFAULT_CURRENCY, DEFAULT_FAILURE_RATE, PaymentGateway};
use crate::realtime::{DEFAULT_CHANNEL_CAPACITY, HEARTBEAT_INTERVAL, RealtimeTransport};
use crate::retry::RetryPolicy;
use bookings_core::environment::Clock;
use bookings_core::{
    BookingStore, NotificationBroker, NotificationStore, PaymentStore, ServiceCatalog, UserDirectory,
};
use std::sync::Arc;
use std::time::Duration;

/// Storage and lookup backends.
#[derive(Clone)]
pub struct Stores {
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// Payments and refunds
    pub payments: Arc<dyn PaymentStore>,
    /// Notifications
    pub notifications: Arc<dyn NotificationStore>,
    /// Read-only service catalog
    pub catalog: Arc<dyn ServiceCatalog>,
    /// Read-only user directory
    pub users: Arc<dyn UserDirectory>,
}

/// Tunables for [`BookingSystem::build`].
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Probability that a payment is declined
    pub failure_rate: f64,
    /// Currency used when a request names none
    pub currency: String,
    /// Keep-alive cadence on realtime connections
    pub heartbeat: Duration,
    /// Per-connection delivery buffer
    pub channel_capacity: usize,
    /// Backoff for notification persistence
    pub retry: RetryPolicy,
    /// Fixed RNG seed for reproducible payment outcomes
    pub seed: Option<u64>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            failure_rate: DEFAULT_FAILURE_RATE,
            currency: DEFAULT_CURRENCY.to_string(),
            heartbeat: HEARTBEAT_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry: RetryPolicy::default(),
            seed: None,
        }
    }
}

/// Every runtime component, ready to be shared with request handlers.
#[derive(Clone)]
pub struct BookingSystem {
    /// The booking saga
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Payments and refunds
    pub gateway: Arc<PaymentGateway>,
    /// Notification creation and fan-out
    pub broadcaster: NotificationBroadcaster,
    /// Live notification streams
    pub transport: RealtimeTransport,
}

impl BookingSystem {
    /// Builds the components. The returned worker must be spawned.
    #[must_use]
    pub fn build(
        stores: Stores,
        broker: Arc<dyn NotificationBroker>,
        clock: Arc<dyn Clock>,
        config: SystemConfig,
    ) -> (Self, OutboxWorker) {
        let (broadcaster, worker) = NotificationBroadcaster::new(
            Arc::clone(&stores.notifications),
            broker,
            Arc::clone(&clock),
            config.retry,
        );

        let mut gateway = PaymentGateway::new(
            Arc::clone(&stores.payments),
            Arc::clone(&stores.bookings),
            Arc::clone(&stores.catalog),
            broadcaster.clone(),
            Arc::clone(&clock),
        )
        .with_failure_rate(config.failure_rate)
        .with_currency(config.currency);
        if let Some(seed) = config.seed {
            gateway = gateway.with_seed(seed);
        }
        let gateway = Arc::new(gateway);

        let orchestrator = Arc::new(BookingOrchestrator::new(
            stores.bookings,
            stores.catalog,
            stores.users,
            Arc::clone(&gateway),
            broadcaster.clone(),
            Arc::clone(&clock),
        ));

        let transport = RealtimeTransport::new(broadcaster.clone(), clock)
            .with_heartbeat(config.heartbeat)
            .with_channel_capacity(config.channel_capacity);

        let system = Self {
            orchestrator,
            gateway,
            broadcaster,
            transport,
        };
        (system, worker)
    }
}
