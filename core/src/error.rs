//! Error taxonomy for booking, payment and notification operations.

use crate::ids::PaymentId;
use thiserror::Error;

/// Result type alias for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Domain-level failures.
///
/// Storage adapters translate backend failures into these variants at the
/// repository boundary, so raw driver errors never travel past a store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced service, booking, payment, notification or user is absent.
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of resource that was looked up
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The requester is not a party to the booking.
    ///
    /// Booking mutation paths also return this when the booking does not exist,
    /// so non-parties cannot discover booking ids.
    #[error("Booking not found or access denied")]
    Unauthorized,

    /// The payment was declined by the gateway.
    #[error("Payment {payment_id} declined: {reason}")]
    PaymentDeclined {
        /// The recorded failed payment
        payment_id: PaymentId,
        /// One of the enumerated gateway failure reasons
        reason: String,
    },

    /// Malformed input (payment instrument, refund amount, pagination...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated (e.g. a second payment for a booking).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The booking saga ended in its rolled-back terminal state.
    ///
    /// Deliberately carries no detail about which step failed.
    #[error("Booking could not be created")]
    BookingNotCreated,

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether retrying the failed operation could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
