//! In-memory storage seeded for trying the API without a database.

use bookings_core::{ServiceId, ServiceListing, UserId};
use bookings_runtime::Stores;
use bookings_runtime::memory::{
    InMemoryBookingStore, InMemoryCatalog, InMemoryNotificationStore, InMemoryPaymentStore,
    InMemoryUserDirectory,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Ids of the seeded records, logged at startup so requests can use them.
#[derive(Debug, Clone)]
pub struct DemoData {
    /// Books services
    pub customer: UserId,
    /// Customer's email, accepted wherever the id is
    pub customer_email: &'static str,
    /// Offers [`DemoData::service`]
    pub provider: UserId,
    /// 60 minutes, 100.00 USD
    pub service: ServiceListing,
}

impl DemoData {
    fn generate() -> Self {
        let provider = UserId::new();
        Self {
            customer: UserId::new(),
            customer_email: "customer@example.com",
            provider,
            service: ServiceListing {
                id: ServiceId::new(),
                provider_id: provider,
                title: "Consultation".to_string(),
                price: Decimal::new(10000, 2),
                currency: "USD".to_string(),
                duration_minutes: 60,
            },
        }
    }
}

/// Empty stores plus a directory and catalog holding one customer, one
/// provider and one service.
#[must_use]
pub fn stores() -> (Stores, DemoData) {
    let demo = DemoData::generate();
    let users = InMemoryUserDirectory::new();
    users.add(demo.customer, demo.customer_email);
    users.add(demo.provider, "provider@example.com");
    let catalog = InMemoryCatalog::new();
    catalog.add(demo.service.clone());

    warn!("DATABASE_URL not set, using in-memory storage; data is lost on exit");
    info!(
        customer_id = %demo.customer,
        customer_email = demo.customer_email,
        provider_id = %demo.provider,
        service_id = %demo.service.id,
        service_title = %demo.service.title,
        "Seeded demo data"
    );

    let stores = Stores {
        bookings: Arc::new(InMemoryBookingStore::new()),
        payments: Arc::new(InMemoryPaymentStore::new()),
        notifications: Arc::new(InMemoryNotificationStore::new()),
        catalog: Arc::new(catalog),
        users: Arc::new(users),
    };
    (stores, demo)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_seeded_records_resolve() {
        let (stores, demo) = stores();

        let by_email = stores.users.resolve(demo.customer_email).await.unwrap();
        assert_eq!(by_email, Some(demo.customer));
        let provider = stores.users.resolve(&demo.provider.to_string()).await.unwrap();
        assert_eq!(provider, Some(demo.provider));

        let service = stores.catalog.get_service(demo.service.id).await.unwrap().unwrap();
        assert_eq!(service.provider_id, demo.provider);
        assert_eq!(service.price, Decimal::new(10000, 2));
        assert!(stores.bookings.list_for_party(demo.customer).await.unwrap().is_empty());
    }
}
