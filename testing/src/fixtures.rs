//! Canonical test data.

use crate::stores::{InMemoryCatalog, InMemoryUserDirectory};
use bookings_core::{
    CreateBookingRequest, PaymentMethod, PaymentRequest, ServiceId, ServiceListing, UserId,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

/// A card that passes validation until 2099.
#[must_use]
pub fn valid_card() -> PaymentMethod {
    PaymentMethod {
        method_type: "card".to_string(),
        card_number: "4242424242424242".to_string(),
        expiry_month: 12,
        expiry_year: 2099,
        cvv: "123".to_string(),
        cardholder_name: "Casey Customer".to_string(),
    }
}

/// Users and a service registered in the in-memory directory and catalog.
#[derive(Debug, Clone)]
pub struct Fixtures {
    /// Books services
    pub customer: UserId,
    /// Customer's email, resolvable like the id
    pub customer_email: String,
    /// Offers [`Fixtures::service`]
    pub provider: UserId,
    /// Known to the directory but party to nothing
    pub stranger: UserId,
    /// 60 minutes, 100.00 USD
    pub service: ServiceListing,
}

impl Fixtures {
    /// Registers the fixture users and service.
    #[must_use]
    pub fn install(users: &InMemoryUserDirectory, catalog: &InMemoryCatalog) -> Self {
        let provider = UserId::new();
        let fixtures = Self {
            customer: UserId::new(),
            customer_email: "casey@example.com".to_string(),
            provider,
            stranger: UserId::new(),
            service: ServiceListing {
                id: ServiceId::new(),
                provider_id: provider,
                title: "Deep Tissue Massage".to_string(),
                price: Decimal::new(10000, 2),
                currency: "USD".to_string(),
                duration_minutes: 60,
            },
        };

        users.add(fixtures.customer, &fixtures.customer_email);
        users.add(fixtures.provider, "pat@example.com");
        users.add(fixtures.stranger, "sam@example.com");
        catalog.add(fixtures.service.clone());
        fixtures
    }

    /// When fixture bookings are scheduled.
    ///
    /// # Panics
    ///
    /// Never: the timestamp is a valid constant.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn scheduled_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0)
            .single()
            .expect("valid constant timestamp")
    }

    /// A request for the fixture service paying its full price.
    #[must_use]
    pub fn booking_request(&self) -> CreateBookingRequest {
        CreateBookingRequest {
            service_id: self.service.id,
            scheduled_at: Self::scheduled_at(),
            notes: Some("First visit".to_string()),
            payment: PaymentRequest {
                amount: self.service.price,
                currency: Some(self.service.currency.clone()),
                payment_method: valid_card(),
            },
        }
    }
}
