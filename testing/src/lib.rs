//! # Bookings Testing
//!
//! Testing utilities for the booking platform.
//!
//! This crate provides:
//! - In-memory implementations of every storage and lookup port ([`stores`])
//! - A controllable clock ([`mocks::FixedClock`])
//! - Ready-made users, a service and valid cards ([`fixtures`])
//! - Proptest strategies for domain inputs ([`properties`])
//! - [`TestHarness`]: a fully wired in-process system
//!
//! ## Example
//!
//! ```ignore
//! use bookings_testing::TestHarness;
//!
//! #[tokio::test]
//! async fn confirmed_when_payment_succeeds() {
//!     let harness = TestHarness::with_failure_rate(0.0);
//!     let booking = harness.create_booking().await.unwrap();
//!     assert_eq!(booking.status, BookingStatus::Confirmed);
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub use bookings_runtime::memory as stores;

/// Mock implementations of Environment traits.
pub mod mocks {
    use bookings_core::environment::Clock;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`advance`](Self::advance) or
    /// [`set`](Self::set). Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use bookings_testing::mocks::FixedClock;
    /// use bookings_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// assert_eq!(before, clock.now());
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now() - before, Duration::seconds(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Proptest strategies for domain inputs.
pub mod properties {
    use bookings_core::PaymentMethod;
    use proptest::prelude::*;

    /// Cards of every shape: valid, non-numeric, expired, bad CVV.
    pub fn arb_payment_method() -> impl Strategy<Value = PaymentMethod> {
        (
            "[0-9]{14,20}|[0-9a-z -]{16}",
            0u32..=13,
            2020i32..=2035,
            "[0-9]{2,5}|[0-9a-z]{3}",
            "[A-Za-z ]{0,20}",
        )
            .prop_map(|(card_number, expiry_month, expiry_year, cvv, cardholder_name)| PaymentMethod {
                method_type: "card".to_string(),
                card_number,
                expiry_month,
                expiry_year,
                cvv,
                cardholder_name,
            })
    }
}

pub use fixtures::{Fixtures, valid_card};
pub use harness::TestHarness;
pub use mocks::{FixedClock, test_clock};
pub use stores::{
    InMemoryBookingStore, InMemoryCatalog, InMemoryNotificationStore, InMemoryPaymentStore,
    InMemoryUserDirectory,
};
