//! Booking records and the requests that create or patch them.

use crate::ids::{BookingId, ServiceId, UserId};
use crate::payment::PaymentRequest;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a booking.
///
/// A booking is only observable as `Confirmed` once its payment completed.
/// After that, any status may be patched to any other by a party to the
/// booking; there is no transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Persisted, payment not yet settled. Never visible outside the saga.
    Pending,
    /// Payment completed.
    Confirmed,
    /// Cancelled by the customer or provider.
    Cancelled,
    /// Service delivered.
    Completed,
}

impl BookingStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// A booking of a provider's service by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Customer who booked
    pub customer_id: UserId,
    /// Booked service
    pub service_id: ServiceId,
    /// Provider offering the service
    pub provider_id: UserId,
    /// Current status
    pub status: BookingStatus,
    /// When the service takes place
    pub scheduled_at: DateTime<Utc>,
    /// Copied from the service at creation time
    pub duration_minutes: i32,
    /// Copied from the service price at creation time
    pub total_amount: Decimal,
    /// Free-form notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether `user` is the customer or the provider of this booking.
    #[must_use]
    pub fn is_party(&self, user: UserId) -> bool {
        self.customer_id == user || self.provider_id == user
    }

    /// Applies the present fields of `patch`. Returns whether the status changed.
    pub fn apply(&mut self, patch: &BookingPatch, now: DateTime<Utc>) -> bool {
        let previous = self.status;
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            self.scheduled_at = scheduled_at;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        self.updated_at = now;
        previous != self.status
    }
}

/// Request to create a booking together with its mandatory payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Service to book
    pub service_id: ServiceId,
    /// When the service should take place
    pub scheduled_at: DateTime<Utc>,
    /// Optional notes for the provider
    #[serde(default)]
    pub notes: Option<String>,
    /// Payment to charge for the booking
    pub payment: PaymentRequest,
}

/// Partial update of a booking. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    /// New status
    #[serde(default)]
    pub status: Option<BookingStatus>,
    /// New schedule
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// New notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub const fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            scheduled_at: None,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;

    fn booking() -> Booking {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Booking {
            id: BookingId::new(),
            customer_id: UserId::new(),
            service_id: ServiceId::new(),
            provider_id: UserId::new(),
            status: BookingStatus::Confirmed,
            scheduled_at: at,
            duration_minutes: 60,
            total_amount: Decimal::new(10000, 2),
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&BookingStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
    }

    #[test]
    fn test_parties() {
        let b = booking();
        assert!(b.is_party(b.customer_id));
        assert!(b.is_party(b.provider_id));
        assert!(!b.is_party(UserId::new()));
    }

    #[test]
    fn test_apply_reports_status_change() {
        let mut b = booking();
        let later = b.created_at + chrono::Duration::hours(1);

        let notes_only = BookingPatch {
            notes: Some("bring towels".to_string()),
            ..BookingPatch::default()
        };
        assert!(!b.apply(&notes_only, later));
        assert_eq!(b.notes.as_deref(), Some("bring towels"));
        assert_eq!(b.updated_at, later);

        assert!(b.apply(&BookingPatch::status(BookingStatus::Cancelled), later));
        assert_eq!(b.status, BookingStatus::Cancelled);

        // Any status may move to any other.
        assert!(b.apply(&BookingPatch::status(BookingStatus::Pending), later));
    }

    #[test]
    fn test_booking_json_is_camel_case() {
        let value = serde_json::to_value(booking()).unwrap();
        assert!(value.get("customerId").is_some());
        assert!(value.get("totalAmount").is_some());
        assert_eq!(value["status"], "CONFIRMED");
    }
}
