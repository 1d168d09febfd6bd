//! Notification records, drafts and pagination.

use crate::error::DomainError;
use crate::ids::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain event a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum NotificationType {
    BookingCreated,
    BookingUpdated,
    BookingCancelled,
    PaymentSuccess,
    PaymentFailed,
    RefundProcessed,
    ServiceCreated,
    ServiceUpdated,
    ServiceDeleted,
    PasswordReset,
    PasswordResetConfirmed,
}

impl NotificationType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::BookingCreated,
        Self::BookingUpdated,
        Self::BookingCancelled,
        Self::PaymentSuccess,
        Self::PaymentFailed,
        Self::RefundProcessed,
        Self::ServiceCreated,
        Self::ServiceUpdated,
        Self::ServiceDeleted,
        Self::PasswordReset,
        Self::PasswordResetConfirmed,
    ];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BookingCreated => "BOOKING_CREATED",
            Self::BookingUpdated => "BOOKING_UPDATED",
            Self::BookingCancelled => "BOOKING_CANCELLED",
            Self::PaymentSuccess => "PAYMENT_SUCCESS",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::RefundProcessed => "REFUND_PROCESSED",
            Self::ServiceCreated => "SERVICE_CREATED",
            Self::ServiceUpdated => "SERVICE_UPDATED",
            Self::ServiceDeleted => "SERVICE_DELETED",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::PasswordResetConfirmed => "PASSWORD_RESET_CONFIRMED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown notification type: {s}"))
    }
}

/// A persisted notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification id
    pub id: NotificationId,
    /// Recipient
    pub user_id: UserId,
    /// Event kind
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// Key fields of the entity that triggered the notification
    pub data: serde_json::Value,
    /// Whether the recipient has read it
    pub is_read: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Set on first read
    pub read_at: Option<DateTime<Utc>>,
}

/// A notification that has not been assigned an id or timestamp yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    /// Recipient
    pub user_id: UserId,
    /// Event kind
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// Structured payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NotificationDraft {
    /// Materializes the draft as an unread notification created at `now`.
    #[must_use]
    pub fn into_notification(self, id: NotificationId, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            data: self.data,
            is_read: false,
            created_at: now,
            read_at: None,
        }
    }
}

/// Total and unread notification counts for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCounts {
    /// All notifications
    pub total: u64,
    /// Unread notifications
    pub unread: u64,
}

/// Limit/offset window over a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1 to [`Page::MAX_LIMIT`]
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Page {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Largest accepted page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Builds a page, applying defaults for absent values.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] if `limit` is outside `1..=100`
    /// or `offset` is negative.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, DomainError> {
        let limit = limit.unwrap_or(i64::from(Self::DEFAULT_LIMIT));
        let offset = offset.unwrap_or(0);
        let limit = u32::try_from(limit)
            .ok()
            .filter(|l| (1..=Self::MAX_LIMIT).contains(l))
            .ok_or_else(|| {
                DomainError::Validation(format!("limit must be between 1 and {}", Self::MAX_LIMIT))
            })?;
        let offset = u32::try_from(offset)
            .map_err(|_| DomainError::Validation("offset must be non-negative".to_string()))?;
        Ok(Self { limit, offset })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
