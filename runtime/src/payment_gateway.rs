//! Simulated payment gateway.
//!
//! Authorization is a coin flip against a configurable failure rate; a
//! declined payment gets one of [`FAILURE_REASONS`] at random. Every attempt
//! is recorded, completed or failed. Refunds never fail but only apply to
//! completed payments.
//!
//! Payment and refund notifications go to the customer of the paid booking
//! and are best-effort.

use crate::broadcaster::NotificationBroadcaster;
use crate::metrics::PaymentMetrics;
use crate::templates::payment_notification;
use bookings_core::environment::Clock;
use bookings_core::payment::{AUTOMATIC_REFUND_REASON, DEFAULT_REFUND_REASON, FAILURE_REASONS};
use bookings_core::{
    BookingId, BookingStore, DomainError, NotificationType, Payment, PaymentId, PaymentMethod,
    PaymentStatus, PaymentStore, Refund, RefundId, RefundStatus, Result, ServiceCatalog, ServiceId,
    UserId,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Default probability that a payment is declined.
pub const DEFAULT_FAILURE_RATE: f64 = 0.1;

/// Default currency when a request does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Simulated payment processor backed by a [`PaymentStore`].
pub struct PaymentGateway {
    payments: Arc<dyn PaymentStore>,
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn ServiceCatalog>,
    broadcaster: NotificationBroadcaster,
    clock: Arc<dyn Clock>,
    failure_rate: f64,
    currency: String,
    rng: Mutex<StdRng>,
}

impl PaymentGateway {
    /// Gateway with the default failure rate and an entropy-seeded RNG.
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        bookings: Arc<dyn BookingStore>,
        catalog: Arc<dyn ServiceCatalog>,
        broadcaster: NotificationBroadcaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payments,
            bookings,
            catalog,
            broadcaster,
            clock,
            failure_rate: DEFAULT_FAILURE_RATE,
            currency: DEFAULT_CURRENCY.to_string(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Set the decline probability, clamped to `0.0..=1.0`.
    ///
    /// `0.0` never declines and `1.0` always does.
    #[must_use]
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = if failure_rate.is_nan() {
            DEFAULT_FAILURE_RATE
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self
    }

    /// Set the currency used when a request omits one.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Make outcomes reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// The configured decline probability.
    #[must_use]
    pub const fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Pre-flight check of a card against today's date.
    ///
    /// Says nothing about whether [`process_payment`](Self::process_payment)
    /// will succeed.
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] describing the first broken rule.
    pub fn validate_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        method.validate(self.clock.now())
    }

    /// Draws the outcome of one authorization: `None` on success, else a reason.
    fn draw_outcome(&self) -> Option<&'static str> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_range(0.0..1.0) < self.failure_rate {
            FAILURE_REASONS.choose(&mut *rng).copied()
        } else {
            None
        }
    }

    /// Charges `amount` for a booking and records the attempt.
    ///
    /// A declined payment is not an error: it comes back as a [`Payment`]
    /// with status `failed` and a `failure_reason`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the booking does not exist
    /// - `Validation` if `amount` is not positive
    /// - `Conflict` if the booking already has a payment
    /// - `Storage` on persistence failures
    pub async fn process_payment(
        &self,
        booking_id: BookingId,
        amount: Decimal,
        currency: Option<&str>,
        method: &PaymentMethod,
    ) -> Result<Payment> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::Validation("Amount must be greater than zero".to_string()));
        }
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", booking_id))?;

        let failure_reason = self.draw_outcome();
        let status = if failure_reason.is_some() {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Completed
        };
        let now = self.clock.now();
        let payment = Payment {
            id: PaymentId::new(),
            booking_id,
            status,
            transaction_id: transaction_id(),
            amount,
            currency: currency.unwrap_or(self.currency.as_str()).to_string(),
            payment_method: method.summary(),
            failure_reason: failure_reason.map(ToString::to_string),
            created_at: now,
            updated_at: now,
        };
        self.payments.insert_payment(&payment).await?;
        PaymentMetrics::record_payment(status.as_str());

        match &payment.failure_reason {
            Some(reason) => tracing::warn!(
                payment_id = %payment.id,
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                reason = %reason,
                "Payment declined"
            ),
            None => tracing::info!(
                payment_id = %payment.id,
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                amount = %payment.amount,
                currency = %payment.currency,
                "Payment completed"
            ),
        }

        let notification_type = if status == PaymentStatus::Completed {
            NotificationType::PaymentSuccess
        } else {
            NotificationType::PaymentFailed
        };
        let title = self.service_title(booking.service_id).await;
        self.broadcaster.dispatch(payment_notification(
            booking.customer_id,
            notification_type,
            payment.id,
            payment.amount,
            &payment.currency,
            title.as_deref(),
        ));

        Ok(payment)
    }

    /// Refunds a completed payment.
    ///
    /// Returns `Ok(None)` and changes nothing when the payment does not exist
    /// or is not `completed`. Otherwise marks the payment `refunded` and
    /// records a completed refund (the full payment amount unless `amount` is
    /// given). Of several concurrent requests for one payment, one succeeds.
    ///
    /// # Errors
    ///
    /// - `Validation` if `amount` is not in `0 < amount <= payment.amount`
    /// - `Storage` on persistence failures
    pub async fn process_refund(
        &self,
        payment_id: PaymentId,
        reason: Option<String>,
        amount: Option<Decimal>,
    ) -> Result<Option<Refund>> {
        let Some(payment) = self.payments.get_payment(payment_id).await? else {
            tracing::debug!(payment_id = %payment_id, "Refund rejected: payment not found");
            return Ok(None);
        };
        if payment.status != PaymentStatus::Completed {
            tracing::debug!(
                payment_id = %payment_id,
                status = %payment.status,
                "Refund rejected: payment not completed"
            );
            return Ok(None);
        }
        let amount = match amount {
            Some(a) if a <= Decimal::ZERO || a > payment.amount => {
                return Err(DomainError::Validation(format!(
                    "Refund amount must be greater than zero and at most {}",
                    payment.amount
                )));
            }
            Some(a) => a,
            None => payment.amount,
        };

        let now = self.clock.now();
        if !self.payments.mark_refunded(payment_id, now).await? {
            tracing::debug!(payment_id = %payment_id, "Refund rejected: payment refunded concurrently");
            return Ok(None);
        }
        let refund = Refund {
            id: RefundId::new(),
            payment_id,
            status: RefundStatus::Completed,
            amount,
            reason: reason.unwrap_or_else(|| DEFAULT_REFUND_REASON.to_string()),
            created_at: now,
        };
        if let Err(err) = self.payments.insert_refund(&refund).await {
            if let Err(restore) = self
                .payments
                .update_payment_status(payment_id, PaymentStatus::Completed, None, now)
                .await
            {
                tracing::error!(
                    payment_id = %payment_id,
                    error = %restore,
                    "Failed to restore payment after refund insert failed"
                );
            }
            return Err(err);
        }
        PaymentMetrics::record_refund("requested");
        tracing::info!(
            refund_id = %refund.id,
            payment_id = %payment_id,
            amount = %refund.amount,
            "Refund processed"
        );

        match self.bookings.get(payment.booking_id).await {
            Ok(Some(booking)) => {
                let title = self.service_title(booking.service_id).await;
                self.broadcaster.dispatch(payment_notification(
                    booking.customer_id,
                    NotificationType::RefundProcessed,
                    payment_id,
                    refund.amount,
                    &payment.currency,
                    title.as_deref(),
                ));
            }
            Ok(None) => tracing::debug!(
                payment_id = %payment_id,
                booking_id = %payment.booking_id,
                "Booking gone, refund notification skipped"
            ),
            Err(err) => tracing::warn!(
                payment_id = %payment_id,
                error = %err,
                "Could not resolve refund recipient"
            ),
        }

        Ok(Some(refund))
    }

    /// Records the gateway-side reversal of a declined payment.
    ///
    /// Used by the booking saga after the booking has been deleted. The
    /// payment keeps its `failed` status; the refund covers its full amount.
    pub(crate) async fn reverse_failed_payment(
        &self,
        payment: &Payment,
        customer: UserId,
        service_title: &str,
    ) -> Result<Refund> {
        let refund = Refund {
            id: RefundId::new(),
            payment_id: payment.id,
            status: RefundStatus::Completed,
            amount: payment.amount,
            reason: AUTOMATIC_REFUND_REASON.to_string(),
            created_at: self.clock.now(),
        };
        self.payments.insert_refund(&refund).await?;
        PaymentMetrics::record_refund("reversal");
        tracing::info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            booking_id = %payment.booking_id,
            "Declined payment reversed"
        );

        self.broadcaster.dispatch(payment_notification(
            customer,
            NotificationType::RefundProcessed,
            payment.id,
            refund.amount,
            &payment.currency,
            Some(service_title),
        ));
        Ok(refund)
    }

    /// Loads a payment.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        self.payments
            .get_payment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", id))
    }

    /// Loads the payment recorded for a booking.
    ///
    /// # Errors
    ///
    /// `NotFound` if the booking has no payment.
    pub async fn get_payment_by_booking(&self, booking_id: BookingId) -> Result<Payment> {
        self.payments
            .get_payment_by_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment for booking", booking_id))
    }

    /// Refunds issued against a payment.
    ///
    /// # Errors
    ///
    /// `NotFound` if the payment does not exist.
    pub async fn list_refunds(&self, payment_id: PaymentId) -> Result<Vec<Refund>> {
        self.get_payment(payment_id).await?;
        self.payments.list_refunds(payment_id).await
    }

    async fn service_title(&self, service_id: ServiceId) -> Option<String> {
        match self.catalog.get_service(service_id).await {
            Ok(service) => service.map(|s| s.title),
            Err(err) => {
                tracing::warn!(service_id = %service_id, error = %err, "Service lookup failed");
                None
            }
        }
    }
}

fn transaction_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("txn_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_transaction_id_shape() {
        let id = transaction_id();
        assert!(id.starts_with("txn_"));
        assert_eq!(id.len(), 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_failure_reasons_are_distinct() {
        let mut reasons = FAILURE_REASONS.to_vec();
        reasons.sort_unstable();
        reasons.dedup();
        assert_eq!(reasons.len(), 10);
    }
}
