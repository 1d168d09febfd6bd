//! Integration tests for the simulated payment gateway

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use bookings_core::{
    BookingId, DomainError, NotificationType, Payment, PaymentId, PaymentStatus, PaymentStore,
    Refund, RefundStatus, StoreFuture,
};
use bookings_testing::properties::arb_payment_method;
use bookings_testing::{TestHarness, valid_card};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Delegates to the wrapped store, yielding to the scheduler after each
/// payment lookup so concurrent callers interleave between read and write.
struct YieldAfterRead(Arc<dyn PaymentStore>);

impl PaymentStore for YieldAfterRead {
    fn insert_payment(&self, payment: &Payment) -> StoreFuture<'_, ()> {
        self.0.insert_payment(payment)
    }

    fn get_payment(&self, id: PaymentId) -> StoreFuture<'_, Option<Payment>> {
        Box::pin(async move {
            let payment = self.0.get_payment(id).await?;
            tokio::task::yield_now().await;
            Ok(payment)
        })
    }

    fn get_payment_by_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Payment>> {
        self.0.get_payment_by_booking(booking_id)
    }

    fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        failure_reason: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        self.0.update_payment_status(id, status, failure_reason, updated_at)
    }

    fn mark_refunded(&self, id: PaymentId, updated_at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        self.0.mark_refunded(id, updated_at)
    }

    fn insert_refund(&self, refund: &Refund) -> StoreFuture<'_, ()> {
        self.0.insert_refund(refund)
    }

    fn list_refunds(&self, payment_id: PaymentId) -> StoreFuture<'_, Vec<Refund>> {
        self.0.list_refunds(payment_id)
    }
}

#[tokio::test]
async fn test_refund_flips_completed_payment_to_refunded() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let gateway = &harness.system.gateway;
    let payment = gateway.get_payment_by_booking(booking.id).await.unwrap();

    let refund = gateway.process_refund(payment.id, None, None).await.unwrap().unwrap();

    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(refund.amount, payment.amount);
    assert_eq!(refund.reason, "Customer requested refund");
    let after = gateway.get_payment(payment.id).await.unwrap();
    assert_eq!(after.status, PaymentStatus::Refunded);
    assert!(after.failure_reason.is_none());
    assert_eq!(gateway.list_refunds(payment.id).await.unwrap(), vec![refund]);
}

#[tokio::test]
async fn test_refund_requires_completed_payment() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let gateway = &harness.system.gateway;
    let payment = gateway.get_payment_by_booking(booking.id).await.unwrap();

    gateway.process_refund(payment.id, None, None).await.unwrap().unwrap();
    // Now refunded: a second refund is rejected and writes nothing.
    assert!(gateway.process_refund(payment.id, None, None).await.unwrap().is_none());
    assert_eq!(harness.payments.refunds().len(), 1);

    assert!(gateway.process_refund(PaymentId::new(), None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_payment_cannot_be_refunded_by_request() {
    let harness = TestHarness::with_failure_rate(1.0);
    harness.create_booking().await.unwrap_err();
    let failed = harness.payments.payments().remove(0);

    let refund = harness
        .system
        .gateway
        .process_refund(failed.id, Some("please".to_string()), None)
        .await
        .unwrap();

    assert!(refund.is_none());
    // Only the saga's own reversal exists.
    assert_eq!(harness.payments.refunds().len(), 1);
    assert_eq!(
        harness.system.gateway.get_payment(failed.id).await.unwrap().status,
        PaymentStatus::Failed
    );
}

#[tokio::test]
async fn test_concurrent_refunds_write_one_refund() {
    let config = bookings_runtime::SystemConfig {
        failure_rate: 0.0,
        ..bookings_runtime::SystemConfig::default()
    };
    let harness = TestHarness::with_stores(config, |mut stores| {
        stores.payments = Arc::new(YieldAfterRead(stores.payments));
        stores
    });
    let booking = harness.create_booking().await.unwrap();
    let gateway = &harness.system.gateway;
    let payment = gateway.get_payment_by_booking(booking.id).await.unwrap();

    let (first, second) = tokio::join!(
        gateway.process_refund(payment.id, None, None),
        gateway.process_refund(payment.id, None, None),
    );

    let granted: Vec<_> = [first.unwrap(), second.unwrap()].into_iter().flatten().collect();
    assert_eq!(granted.len(), 1);
    assert_eq!(harness.payments.refunds(), granted);
    assert_eq!(
        gateway.get_payment(payment.id).await.unwrap().status,
        PaymentStatus::Refunded
    );
}

#[tokio::test]
async fn test_partial_refund_amount_is_bounded() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let gateway = &harness.system.gateway;
    let payment = gateway.get_payment_by_booking(booking.id).await.unwrap();

    let too_much = gateway
        .process_refund(payment.id, None, Some(payment.amount + Decimal::ONE))
        .await
        .unwrap_err();
    assert!(matches!(too_much, DomainError::Validation(_)));
    let zero = gateway.process_refund(payment.id, None, Some(Decimal::ZERO)).await.unwrap_err();
    assert!(matches!(zero, DomainError::Validation(_)));

    let partial = gateway
        .process_refund(payment.id, Some("late".to_string()), Some(Decimal::new(2500, 2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(partial.amount, Decimal::new(2500, 2));
    assert_eq!(partial.reason, "late");
}

#[tokio::test]
async fn test_refund_notifies_customer() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();
    let gateway = &harness.system.gateway;
    let payment = gateway.get_payment_by_booking(booking.id).await.unwrap();
    let before = harness.wait_for_notifications(harness.fixtures.customer, 2).await.len();

    gateway.process_refund(payment.id, None, None).await.unwrap().unwrap();

    let notifications = harness
        .wait_for_notifications(harness.fixtures.customer, before + 1)
        .await;
    let last = notifications.last().unwrap();
    assert_eq!(last.notification_type, NotificationType::RefundProcessed);
    assert_eq!(last.message, "Refund of 100.00 USD has been processed");
}

#[tokio::test]
async fn test_second_payment_for_booking_conflicts() {
    let harness = TestHarness::with_failure_rate(0.0);
    let booking = harness.create_booking().await.unwrap();

    let err = harness
        .system
        .gateway
        .process_payment(booking.id, Decimal::ONE, None, &valid_card())
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(harness.payments.payments().len(), 1);
}

#[tokio::test]
async fn test_payment_for_unknown_booking_is_not_found() {
    let harness = TestHarness::with_failure_rate(0.0);

    let err = harness
        .system
        .gateway
        .process_payment(BookingId::new(), Decimal::ONE, None, &valid_card())
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { resource: "Booking", .. }));
}

#[tokio::test]
async fn test_declined_payment_carries_listed_reason() {
    let harness = TestHarness::with_failure_rate(1.0);
    harness.create_booking().await.unwrap_err();

    let payment = harness.payments.payments().remove(0);
    let reason = payment.failure_reason.unwrap();
    assert!(bookings_core::payment::FAILURE_REASONS.contains(&reason.as_str()));
    assert!(payment.transaction_id.starts_with("txn_"));
    assert_eq!(payment.payment_method.last4, "4242");
}

proptest! {
    #[test]
    fn prop_validation_ignores_payment_outcomes(method in arb_payment_method()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let always_fails = TestHarness::with_failure_rate(1.0);
            let never_fails = TestHarness::with_failure_rate(0.0);

            let before = always_fails.system.gateway.validate_payment_method(&method);
            // Burn some random draws in between.
            always_fails.create_booking().await.unwrap_err();
            let after = always_fails.system.gateway.validate_payment_method(&method);
            let other = never_fails.system.gateway.validate_payment_method(&method);

            assert_eq!(before, after);
            assert_eq!(before, other);
        });
    }
}
