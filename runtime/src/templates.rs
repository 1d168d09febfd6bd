//! Canned notification titles, messages and payloads.
//!
//! Pure formatting: the same inputs always produce the same draft.

use bookings_core::{BookingId, NotificationDraft, NotificationType, PaymentId, ServiceId, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::json;

/// Draft for a booking lifecycle event.
#[must_use]
pub fn booking_notification(
    user: UserId,
    notification_type: NotificationType,
    booking_id: BookingId,
    service_title: &str,
    scheduled_at: DateTime<Utc>,
) -> NotificationDraft {
    let (title, verb) = match notification_type {
        NotificationType::BookingCreated => ("Booking Confirmed", "has been confirmed"),
        NotificationType::BookingUpdated => ("Booking Updated", "has been updated"),
        NotificationType::BookingCancelled => ("Booking Cancelled", "has been cancelled"),
        _ => ("Booking Notification", ""),
    };
    let message = if verb.is_empty() {
        format!("Update for your booking '{service_title}'")
    } else {
        format!("Your booking for '{service_title}' {verb}")
    };

    NotificationDraft {
        user_id: user,
        notification_type,
        title: title.to_string(),
        message,
        data: json!({
            "bookingId": booking_id,
            "serviceTitle": service_title,
            "scheduledAt": scheduled_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    }
}

/// Draft for a payment or refund event.
#[must_use]
pub fn payment_notification(
    user: UserId,
    notification_type: NotificationType,
    payment_id: PaymentId,
    amount: Decimal,
    currency: &str,
    service_title: Option<&str>,
) -> NotificationDraft {
    let (title, message) = match notification_type {
        NotificationType::PaymentSuccess => (
            "Payment Successful",
            format!("Payment of {amount} {currency} has been processed successfully"),
        ),
        NotificationType::PaymentFailed => (
            "Payment Failed",
            format!("Payment of {amount} {currency} could not be processed"),
        ),
        NotificationType::RefundProcessed => (
            "Refund Processed",
            format!("Refund of {amount} {currency} has been processed"),
        ),
        _ => (
            "Payment Notification",
            format!("Payment update: {amount} {currency}"),
        ),
    };

    NotificationDraft {
        user_id: user,
        notification_type,
        title: title.to_string(),
        message,
        data: json!({
            "paymentId": payment_id,
            "amount": amount,
            "currency": currency,
            "serviceTitle": service_title,
        }),
    }
}

/// Draft for a service catalog event.
#[must_use]
pub fn service_notification(
    user: UserId,
    notification_type: NotificationType,
    service_id: ServiceId,
    service_title: &str,
) -> NotificationDraft {
    let (title, message) = match notification_type {
        NotificationType::ServiceCreated => (
            "Service Created",
            format!("Your service '{service_title}' has been created successfully"),
        ),
        NotificationType::ServiceUpdated => (
            "Service Updated",
            format!("Your service '{service_title}' has been updated"),
        ),
        NotificationType::ServiceDeleted => (
            "Service Deleted",
            format!("Your service '{service_title}' has been deleted"),
        ),
        _ => (
            "Service Notification",
            format!("Update for your service '{service_title}'"),
        ),
    };

    NotificationDraft {
        user_id: user,
        notification_type,
        title: title.to_string(),
        message,
        data: json!({
            "serviceId": service_id,
            "serviceTitle": service_title,
        }),
    }
}
