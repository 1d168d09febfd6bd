//! Integration tests for the booking saga
//!
//! Every create call must end in exactly one of two states: a confirmed
//! booking with one completed payment, or no booking and a failed payment
//! with its reversal.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use bookings_core::{
    Booking, BookingId, BookingPatch, BookingStatus, BookingStore, DomainError, NotificationType,
    PaymentStatus, RefundStatus, ServiceId, StoreFuture, UserId,
};
use bookings_runtime::SystemConfig;
use bookings_testing::TestHarness;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Delegates to the wrapped store but fails every update.
struct UpdateFails(Arc<dyn BookingStore>);

impl BookingStore for UpdateFails {
    fn insert(&self, booking: &Booking) -> StoreFuture<'_, ()> {
        self.0.insert(booking)
    }

    fn get(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        self.0.get(id)
    }

    fn update(&self, _booking: &Booking) -> StoreFuture<'_, bool> {
        Box::pin(async { Err(DomainError::Storage("disk full".to_string())) })
    }

    fn delete(&self, id: BookingId) -> StoreFuture<'_, bool> {
        self.0.delete(id)
    }

    fn list_for_party(&self, user: UserId) -> StoreFuture<'_, Vec<Booking>> {
        self.0.list_for_party(user)
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_successful_payment_confirms_booking() {
    let harness = TestHarness::with_failure_rate(0.0);

    let booking = harness.create_booking().await.unwrap();

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.total_amount, Decimal::new(10000, 2));
    assert_eq!(booking.duration_minutes, 60);
    assert_eq!(booking.customer_id, harness.fixtures.customer);
    assert_eq!(booking.provider_id, harness.fixtures.provider);

    let stored = harness.bookings.get(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);

    let payments = harness.payments.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].booking_id, booking.id);
    assert_eq!(payments[0].status, PaymentStatus::Completed);
    assert!(payments[0].failure_reason.is_none());
    assert!(harness.payments.refunds().is_empty());
}

#[tokio::test]
async fn test_declined_payment_rolls_back_booking() {
    let harness = TestHarness::with_failure_rate(1.0);

    let err = harness.create_booking().await.unwrap_err();
    assert_eq!(err, DomainError::BookingNotCreated);

    assert!(harness.bookings.is_empty());
    let payments = harness.payments.payments();
    assert_eq!(payments.len(), 1);
    let payment = &payments[0];
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.failure_reason.is_some());
    assert!(harness.bookings.get(payment.booking_id).await.unwrap().is_none());

    let refunds = harness.payments.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].payment_id, payment.id);
    assert_eq!(refunds[0].status, RefundStatus::Completed);
    assert_eq!(refunds[0].amount, payment.amount);
    assert_eq!(refunds[0].reason, "Payment failed - automatic refund");
}

#[tokio::test]
async fn test_failed_confirmation_refunds_payment_and_deletes_booking() {
    let config = SystemConfig {
        failure_rate: 0.0,
        ..SystemConfig::default()
    };
    let harness = TestHarness::with_stores(config, |mut stores| {
        stores.bookings = Arc::new(UpdateFails(stores.bookings));
        stores
    });

    let err = harness.create_booking().await.unwrap_err();
    assert_eq!(err, DomainError::BookingNotCreated);

    assert!(harness.bookings.is_empty());
    let payments = harness.payments.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Refunded);

    let refunds = harness.payments.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].payment_id, payments[0].id);
    assert_eq!(refunds[0].status, RefundStatus::Completed);
    assert_eq!(refunds[0].amount, payments[0].amount);
    assert_eq!(refunds[0].reason, "Booking confirmation failed - automatic refund");
}

#[tokio::test]
async fn test_every_saga_ends_in_one_of_two_states() {
    let harness = TestHarness::new(SystemConfig {
        failure_rate: 0.5,
        seed: Some(7),
        ..SystemConfig::default()
    });

    for _ in 0..40 {
        match harness.create_booking().await {
            Ok(booking) => {
                let payments = harness.payments.payments();
                let payment = payments.iter().find(|p| p.booking_id == booking.id).unwrap();
                assert_eq!(payment.status, PaymentStatus::Completed);
                assert_eq!(booking.status, BookingStatus::Confirmed);
            }
            Err(err) => assert_eq!(err, DomainError::BookingNotCreated),
        }
    }

    // Across all attempts: every booking left is confirmed and paid, every
    // failed payment has exactly one reversal and no booking.
    let payments = harness.payments.payments();
    let refunds = harness.payments.refunds();
    assert_eq!(payments.len(), 40);
    for payment in &payments {
        let booking = harness.bookings.get(payment.booking_id).await.unwrap();
        let reversals = refunds.iter().filter(|r| r.payment_id == payment.id).count();
        match payment.status {
            PaymentStatus::Completed => {
                assert_eq!(booking.unwrap().status, BookingStatus::Confirmed);
                assert_eq!(reversals, 0);
            }
            PaymentStatus::Failed => {
                assert!(booking.is_none());
                assert_eq!(reversals, 1);
            }
            other => panic!("unexpected payment status {other}"),
        }
    }
}

#[tokio::test]
async fn test_unknown_service_is_not_found_and_writes_nothing() {
    let harness = TestHarness::with_failure_rate(0.0);
    let mut request = harness.fixtures.booking_request();
    request.service_id = ServiceId::new();

    let err = harness
        .system
        .orchestrator
        .create_booking(&harness.fixtures.customer.to_string(), request)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { resource: "Service", .. }));
    assert!(harness.bookings.is_empty());
    assert!(harness.payments.payments().is_empty());
}

#[tokio::test]
async fn test_unknown_customer_or_provider_is_not_found() {
    let harness = TestHarness::with_failure_rate(0.0);

    let err = harness
        .system
        .orchestrator
        .create_booking("ghost@example.com", harness.fixtures.booking_request())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { resource: "User", .. }));

    harness.users.remove(harness.fixtures.provider);
    let err = harness.create_booking().await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { resource: "User", .. }));
    assert!(harness.bookings.is_empty());
}

#[tokio::test]
async fn test_customer_email_resolves_to_canonical_id() {
    let harness = TestHarness::with_failure_rate(0.0);

    let booking = harness
        .system
        .orchestrator
        .create_booking(&harness.fixtures.customer_email, harness.fixtures.booking_request())
        .await
        .unwrap();

    assert_eq!(booking.customer_id, harness.fixtures.customer);
}

#[tokio::test]
async fn test_invalid_card_is_rejected_before_anything_is_written() {
    let harness = TestHarness::with_failure_rate(0.0);
    let mut request = harness.fixtures.booking_request();
    request.payment.payment_method.cvv = "12a".to_string();

    let err = harness
        .system
        .orchestrator
        .create_booking(&harness.fixtures.customer.to_string(), request)
        .await
        .unwrap_err();

    assert_eq!(err, DomainError::Validation("CVV must contain only digits".to_string()));
    assert!(harness.bookings.is_empty());
    assert!(harness.payments.payments().is_empty());
}

#[tokio::test]
async fn test_confirmed_booking_notifies_both_parties() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();

    let provider = harness.wait_for_notifications(harness.fixtures.provider, 1).await;
    assert_eq!(provider.len(), 1);
    assert_eq!(provider[0].notification_type, NotificationType::BookingCreated);
    assert_eq!(provider[0].title, "Booking Confirmed");
    assert_eq!(provider[0].data["bookingId"], booking.id.to_string());

    // Customer gets the payment receipt and the confirmation.
    let customer = harness.wait_for_notifications(harness.fixtures.customer, 2).await;
    let kinds: Vec<_> = customer.iter().map(|n| n.notification_type).collect();
    assert_eq!(kinds, [NotificationType::PaymentSuccess, NotificationType::BookingCreated]);
}

#[tokio::test]
async fn test_declined_booking_notifies_customer_of_failure_and_reversal() {
    let harness = TestHarness::with_failure_rate(1.0);
    harness.create_booking().await.unwrap_err();

    let customer = harness.wait_for_notifications(harness.fixtures.customer, 2).await;
    let kinds: Vec<_> = customer.iter().map(|n| n.notification_type).collect();
    assert_eq!(kinds, [NotificationType::PaymentFailed, NotificationType::RefundProcessed]);
    assert!(harness.notifications.for_user(harness.fixtures.provider).is_empty());
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_only_parties_may_update_or_delete() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let orchestrator = &harness.system.orchestrator;
    let patch = BookingPatch {
        notes: Some("changed".to_string()),
        ..BookingPatch::default()
    };

    let stranger = harness.fixtures.stranger.to_string();
    assert_eq!(
        orchestrator.update_booking(booking.id, patch.clone(), &stranger).await,
        Err(DomainError::Unauthorized)
    );
    assert_eq!(
        orchestrator.delete_booking(booking.id, &stranger).await,
        Err(DomainError::Unauthorized)
    );
    assert_eq!(
        orchestrator.get_booking(booking.id, &stranger).await,
        Err(DomainError::Unauthorized)
    );

    let customer = harness.fixtures.customer.to_string();
    let updated = orchestrator.update_booking(booking.id, patch, &customer).await.unwrap();
    assert_eq!(updated.notes.as_deref(), Some("changed"));

    let provider = harness.fixtures.provider.to_string();
    orchestrator.delete_booking(booking.id, &provider).await.unwrap();
    assert!(harness.bookings.get(booking.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_booking_is_rejected_like_a_foreign_one() {
    let harness = TestHarness::with_failure_rate(0.0);
    let orchestrator = &harness.system.orchestrator;
    let customer = harness.fixtures.customer.to_string();
    let missing = BookingId::new();

    let foreign = harness.create_booking().await.unwrap();
    let foreign_err = orchestrator
        .delete_booking(foreign.id, &harness.fixtures.stranger.to_string())
        .await
        .unwrap_err();
    let missing_err = orchestrator.delete_booking(missing, &customer).await.unwrap_err();
    let unknown_requester_err = orchestrator
        .update_booking(foreign.id, BookingPatch::default(), "ghost@example.com")
        .await
        .unwrap_err();

    assert_eq!(foreign_err, missing_err);
    assert_eq!(foreign_err, unknown_requester_err);
}

#[tokio::test]
async fn test_provider_cancellation_notifies_customer() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let customer_before = harness.wait_for_notifications(harness.fixtures.customer, 2).await.len();

    let cancelled = harness
        .system
        .orchestrator
        .update_booking(
            booking.id,
            BookingPatch::status(BookingStatus::Cancelled),
            &harness.fixtures.provider.to_string(),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let customer = harness
        .wait_for_notifications(harness.fixtures.customer, customer_before + 1)
        .await;
    let last = customer.last().unwrap();
    assert_eq!(last.notification_type, NotificationType::BookingCancelled);
    assert_eq!(last.title, "Booking Cancelled");
    assert_eq!(last.message, "Your booking for 'Deep Tissue Massage' has been cancelled");

    let provider = harness.wait_for_notifications(harness.fixtures.provider, 2).await;
    assert_eq!(provider.last().unwrap().notification_type, NotificationType::BookingCancelled);
}

#[tokio::test]
async fn test_patch_without_status_change_sends_nothing() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    harness.wait_for_notifications(harness.fixtures.provider, 1).await;

    harness
        .system
        .orchestrator
        .update_booking(
            booking.id,
            BookingPatch::status(BookingStatus::Confirmed),
            &harness.fixtures.customer.to_string(),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(harness.notifications.for_user(harness.fixtures.provider).len(), 1);
}

#[tokio::test]
async fn test_any_status_may_follow_any_other() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let customer = harness.fixtures.customer.to_string();

    for status in [
        BookingStatus::Completed,
        BookingStatus::Pending,
        BookingStatus::Cancelled,
        BookingStatus::Confirmed,
    ] {
        let updated = harness
            .system
            .orchestrator
            .update_booking(booking.id, BookingPatch::status(status), &customer)
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn test_list_bookings_returns_only_own_newest_first() {
    let harness = TestHarness::with_failure_rate(0.0);
    let first = harness.create_booking().await.unwrap();
    harness.clock.advance(chrono::Duration::minutes(5));
    let second = harness.create_booking().await.unwrap();

    let orchestrator = &harness.system.orchestrator;
    let mine = orchestrator
        .list_bookings(&harness.fixtures.customer.to_string())
        .await
        .unwrap();
    assert_eq!(mine.iter().map(|b| b.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let providers = orchestrator
        .list_bookings(&harness.fixtures.provider.to_string())
        .await
        .unwrap();
    assert_eq!(providers.len(), 2);

    let strangers = orchestrator
        .list_bookings(&harness.fixtures.stranger.to_string())
        .await
        .unwrap();
    assert!(strangers.is_empty());
}
