//! Booking ownership checks.

use bookings_core::{Booking, DomainError, Result, UserId};

/// Decides who may read or change a booking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    /// Only the booking's customer and provider pass.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for everyone else.
    pub fn authorize_party(self, booking: &Booking, requester: UserId) -> Result<()> {
        if booking.is_party(requester) {
            Ok(())
        } else {
            tracing::debug!(booking_id = %booking.id, requester = %requester, "Requester is not a party");
            Err(DomainError::Unauthorized)
        }
    }

    /// Same as [`authorize_party`](Self::authorize_party), but a missing
    /// booking is rejected exactly like a foreign one.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] if the booking is absent or `requester`
    /// is not a party to it.
    pub fn authorize_lookup(self, booking: Option<Booking>, requester: UserId) -> Result<Booking> {
        let booking = booking.ok_or(DomainError::Unauthorized)?;
        self.authorize_party(&booking, requester)?;
        Ok(booking)
    }
}
