//! The booking saga.
//!
//! ```text
//! INIT ──► PERSISTED_PENDING ──► PAYMENT_ATTEMPTED ──┬──► CONFIRMED
//!                                                    └──► ROLLED_BACK
//! ```
//!
//! A booking is written as `PENDING` before the payment because the payment
//! references it. If the payment is declined the booking is deleted and the
//! declined payment is reversed; the caller only learns that the booking
//! could not be created. The payment and refund rows stay behind as history.
//! A completed payment whose booking then fails to confirm is refunded and
//! the booking deleted the same way.
//!
//! Steps run strictly in order inside the caller's task. Notifications are
//! handed to the broadcaster's outbox and never delay or fail the saga.

use crate::authorization::AuthorizationGuard;
use crate::broadcaster::NotificationBroadcaster;
use crate::metrics::BookingMetrics;
use crate::payment_gateway::PaymentGateway;
use crate::templates::booking_notification;
use bookings_core::environment::Clock;
use bookings_core::payment::CONFIRMATION_FAILED_REFUND_REASON;
use bookings_core::{
    Booking, BookingId, BookingPatch, BookingStatus, BookingStore, CreateBookingRequest, DomainError,
    NotificationType, PaymentStatus, Result, ServiceCatalog, ServiceId, UserDirectory, UserId,
};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Progress of one `create_booking` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    /// Nothing written yet
    Init,
    /// Booking stored as PENDING
    PersistedPending,
    /// Payment recorded, outcome known
    PaymentAttempted,
    /// Terminal success
    Confirmed,
    /// Terminal failure, booking deleted
    RolledBack,
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::PersistedPending => "persisted_pending",
            Self::PaymentAttempted => "payment_attempted",
            Self::Confirmed => "confirmed",
            Self::RolledBack => "rolled_back",
        })
    }
}

/// Coordinates bookings, payments and notifications.
pub struct BookingOrchestrator {
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn ServiceCatalog>,
    users: Arc<dyn UserDirectory>,
    gateway: Arc<PaymentGateway>,
    broadcaster: NotificationBroadcaster,
    clock: Arc<dyn Clock>,
    guard: AuthorizationGuard,
}

impl BookingOrchestrator {
    /// Wire the saga to its collaborators.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        catalog: Arc<dyn ServiceCatalog>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<PaymentGateway>,
        broadcaster: NotificationBroadcaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            catalog,
            users,
            gateway,
            broadcaster,
            clock,
            guard: AuthorizationGuard,
        }
    }

    /// Creates a booking and charges for it.
    ///
    /// On success the booking comes back `CONFIRMED` with exactly one
    /// completed payment. On a declined payment nothing about the booking
    /// remains except the failed payment and its reversal.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the service, the customer or the provider is unknown
    /// - `Validation` if the card fails the pre-flight check
    /// - `BookingNotCreated` if the payment was declined
    /// - `Storage`/`Conflict` from the stores, after the pending booking was removed
    pub async fn create_booking(
        &self,
        customer_identity: &str,
        request: CreateBookingRequest,
    ) -> Result<Booking> {
        let started = Instant::now();
        let booking_id = BookingId::new();
        Self::trace_state(booking_id, SagaState::Init);
        let service = self
            .catalog
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", request.service_id))?;
        let customer = self
            .users
            .resolve(customer_identity)
            .await?
            .ok_or_else(|| DomainError::not_found("User", customer_identity))?;
        let provider = self
            .users
            .resolve(&service.provider_id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found("User", service.provider_id))?;
        self.gateway
            .validate_payment_method(&request.payment.payment_method)?;

        let now = self.clock.now();
        let mut booking = Booking {
            id: booking_id,
            customer_id: customer,
            service_id: service.id,
            provider_id: provider,
            status: BookingStatus::Pending,
            scheduled_at: request.scheduled_at,
            duration_minutes: service.duration_minutes,
            total_amount: service.price,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        self.bookings.insert(&booking).await?;
        Self::trace_state(booking.id, SagaState::PersistedPending);

        let currency = request
            .payment
            .currency
            .as_deref()
            .unwrap_or(service.currency.as_str());
        let payment = match self
            .gateway
            .process_payment(
                booking.id,
                request.payment.amount,
                Some(currency),
                &request.payment.payment_method,
            )
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                self.discard_pending(booking.id).await;
                BookingMetrics::record_rolled_back(started.elapsed());
                return Err(err);
            }
        };
        Self::trace_state(booking.id, SagaState::PaymentAttempted);

        if payment.status != PaymentStatus::Completed {
            self.discard_pending(booking.id).await;
            if let Err(err) = self
                .gateway
                .reverse_failed_payment(&payment, customer, &service.title)
                .await
            {
                tracing::error!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    error = %err,
                    "Failed to record payment reversal"
                );
            }
            Self::trace_state(booking.id, SagaState::RolledBack);
            BookingMetrics::record_rolled_back(started.elapsed());
            return Err(DomainError::BookingNotCreated);
        }

        booking.status = BookingStatus::Confirmed;
        booking.updated_at = self.clock.now();
        let confirmed = match self.bookings.update(&booking).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::not_found("Booking", booking.id)),
            Err(err) => Err(err),
        };
        if let Err(err) = confirmed {
            tracing::error!(
                booking_id = %booking.id,
                payment_id = %payment.id,
                error = %err,
                "Failed to confirm paid booking, refunding"
            );
            self.discard_pending(booking.id).await;
            match self
                .gateway
                .process_refund(
                    payment.id,
                    Some(CONFIRMATION_FAILED_REFUND_REASON.to_string()),
                    None,
                )
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => tracing::error!(
                    payment_id = %payment.id,
                    "Payment was no longer refundable during rollback"
                ),
                Err(err) => tracing::error!(
                    payment_id = %payment.id,
                    error = %err,
                    "Failed to refund payment during rollback"
                ),
            }
            Self::trace_state(booking.id, SagaState::RolledBack);
            BookingMetrics::record_rolled_back(started.elapsed());
            return Err(DomainError::BookingNotCreated);
        }
        Self::trace_state(booking.id, SagaState::Confirmed);
        BookingMetrics::record_confirmed(started.elapsed());

        for recipient in [booking.customer_id, booking.provider_id] {
            self.broadcaster.dispatch(booking_notification(
                recipient,
                NotificationType::BookingCreated,
                booking.id,
                &service.title,
                booking.scheduled_at,
            ));
        }

        Ok(booking)
    }

    /// Applies a patch on behalf of the customer or provider.
    ///
    /// Any status may be set from any other. A status change notifies both
    /// parties (`BOOKING_CANCELLED` when the new status is `CANCELLED`,
    /// `BOOKING_UPDATED` otherwise).
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the booking does not exist, the requester is
    /// unknown, or the requester is not a party; the three are indistinguishable.
    pub async fn update_booking(
        &self,
        booking_id: BookingId,
        patch: BookingPatch,
        requester_identity: &str,
    ) -> Result<Booking> {
        let mut booking = self.authorized(booking_id, requester_identity).await?;
        let status_changed = booking.apply(&patch, self.clock.now());
        if !self.bookings.update(&booking).await? {
            return Err(DomainError::Unauthorized);
        }
        tracing::info!(
            booking_id = %booking.id,
            status = %booking.status,
            status_changed,
            "Booking updated"
        );

        if status_changed {
            let notification_type = if booking.status == BookingStatus::Cancelled {
                NotificationType::BookingCancelled
            } else {
                NotificationType::BookingUpdated
            };
            let title = self.service_title(booking.service_id).await;
            for recipient in [booking.customer_id, booking.provider_id] {
                self.broadcaster.dispatch(booking_notification(
                    recipient,
                    notification_type,
                    booking.id,
                    &title,
                    booking.scheduled_at,
                ));
            }
        }

        Ok(booking)
    }

    /// Deletes a booking on behalf of the customer or provider.
    ///
    /// # Errors
    ///
    /// `Unauthorized` under the same rule as [`update_booking`](Self::update_booking).
    pub async fn delete_booking(&self, booking_id: BookingId, requester_identity: &str) -> Result<()> {
        self.authorized(booking_id, requester_identity).await?;
        if !self.bookings.delete(booking_id).await? {
            return Err(DomainError::Unauthorized);
        }
        tracing::info!(booking_id = %booking_id, "Booking deleted");
        Ok(())
    }

    /// Loads a booking for one of its parties.
    ///
    /// # Errors
    ///
    /// `Unauthorized` under the same rule as [`update_booking`](Self::update_booking).
    pub async fn get_booking(&self, booking_id: BookingId, requester_identity: &str) -> Result<Booking> {
        self.authorized(booking_id, requester_identity).await
    }

    /// Bookings the requester is customer or provider of, newest first.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the requester is unknown.
    pub async fn list_bookings(&self, requester_identity: &str) -> Result<Vec<Booking>> {
        let requester = self.resolve_requester(requester_identity).await?;
        self.bookings.list_for_party(requester).await
    }

    /// Resolves a caller identity (user id or email) to the canonical user id.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the directory does not know the identity.
    pub async fn resolve_requester(&self, identity: &str) -> Result<UserId> {
        self.users
            .resolve(identity)
            .await?
            .ok_or(DomainError::Unauthorized)
    }

    async fn authorized(&self, booking_id: BookingId, identity: &str) -> Result<Booking> {
        let requester = self.resolve_requester(identity).await?;
        let booking = self.bookings.get(booking_id).await?;
        self.guard.authorize_lookup(booking, requester)
    }

    async fn discard_pending(&self, booking_id: BookingId) {
        match self.bookings.delete(booking_id).await {
            Ok(_) => tracing::info!(booking_id = %booking_id, "Pending booking deleted"),
            Err(err) => tracing::error!(
                booking_id = %booking_id,
                error = %err,
                "Failed to delete pending booking"
            ),
        }
    }

    async fn service_title(&self, service_id: ServiceId) -> String {
        match self.catalog.get_service(service_id).await {
            Ok(Some(service)) => service.title,
            Ok(None) => "your service".to_string(),
            Err(err) => {
                tracing::warn!(service_id = %service_id, error = %err, "Service lookup failed");
                "your service".to_string()
            }
        }
    }

    fn trace_state(booking_id: BookingId, state: SagaState) {
        tracing::debug!(booking_id = %booking_id, state = %state, "Booking saga advanced");
    }
}
