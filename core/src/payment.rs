//! Payments, refunds and payment instruments.

use crate::error::DomainError;
use crate::ids::{BookingId, PaymentId, RefundId};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reasons a simulated payment can be declined. One is drawn uniformly on failure.
pub const FAILURE_REASONS: [&str; 10] = [
    "Insufficient funds",
    "Card declined by bank",
    "Invalid card number",
    "Expired card",
    "CVV verification failed",
    "Transaction timeout",
    "Network error",
    "Card blocked",
    "Daily limit exceeded",
    "Fraud detection triggered",
];

/// Default reason recorded on customer-initiated refunds.
pub const DEFAULT_REFUND_REASON: &str = "Customer requested refund";

/// Reason recorded on the reversal issued when a booking's payment fails.
pub const AUTOMATIC_REFUND_REASON: &str = "Payment failed - automatic refund";

/// Reason recorded when a paid booking cannot be confirmed and is rolled back.
pub const CONFIRMATION_FAILED_REFUND_REASON: &str = "Booking confirmation failed - automatic refund";

/// Status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet settled
    Pending,
    /// Funds captured
    Completed,
    /// Declined; `failure_reason` is set
    Failed,
    /// Completed and later refunded
    Refunded,
}

/// Status of a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Not yet settled
    Pending,
    /// Settled
    Completed,
    /// Rejected by the gateway
    Failed,
}

macro_rules! lowercase_status {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Storage representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($name))),
                }
            }
        }
    };
}

lowercase_status!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

lowercase_status!(RefundStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

fn default_method_type() -> String {
    "card".to_string()
}

/// Card details submitted by the client.
///
/// Never persisted as-is: see [`CardSummary`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    /// Instrument kind, always `card` today
    #[serde(rename = "type", default = "default_method_type")]
    pub method_type: String,
    /// 16 to 19 digits
    pub card_number: String,
    /// 1 to 12
    pub expiry_month: u32,
    /// Four-digit year
    pub expiry_year: i32,
    /// 3 or 4 digits
    pub cvv: String,
    /// Name printed on the card
    pub cardholder_name: String,
}

impl fmt::Debug for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentMethod")
            .field("method_type", &self.method_type)
            .field("card_number", &mask(&self.card_number))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cardholder_name", &self.cardholder_name)
            .finish_non_exhaustive()
    }
}

fn mask(card_number: &str) -> String {
    let digits: Vec<char> = card_number.chars().collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

impl PaymentMethod {
    /// Checks the instrument against the calendar date of `now`.
    ///
    /// Pure: the same instrument and date always produce the same answer.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] with a human-readable message for the
    /// first rule the instrument breaks.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        let invalid =
            |msg: &str| -> Result<(), DomainError> { Err(DomainError::Validation(msg.to_string())) };

        if !(16..=19).contains(&self.card_number.len()) {
            return invalid("Card number must be between 16 and 19 digits");
        }
        if !self.card_number.chars().all(|c| c.is_ascii_digit()) {
            return invalid("Card number must contain only digits");
        }
        if !(1..=12).contains(&self.expiry_month) {
            return invalid("Expiry month must be between 1 and 12");
        }
        let (year, month) = (now.year(), now.month());
        if self.expiry_year < year || (self.expiry_year == year && self.expiry_month < month) {
            return invalid("Card has expired");
        }
        if !(3..=4).contains(&self.cvv.len()) {
            return invalid("CVV must be 3 or 4 digits");
        }
        if !self.cvv.chars().all(|c| c.is_ascii_digit()) {
            return invalid("CVV must contain only digits");
        }
        if self.cardholder_name.trim().is_empty() {
            return invalid("Cardholder name is required");
        }
        Ok(())
    }

    /// The storable, non-sensitive view of this instrument.
    #[must_use]
    pub fn summary(&self) -> CardSummary {
        let len = self.card_number.chars().count();
        CardSummary {
            method_type: self.method_type.clone(),
            last4: self.card_number.chars().skip(len.saturating_sub(4)).collect(),
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
            cardholder_name: self.cardholder_name.clone(),
        }
    }
}

/// Masked instrument recorded on a payment: last four digits, no CVV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    /// Instrument kind
    #[serde(rename = "type")]
    pub method_type: String,
    /// Last four digits of the card number
    pub last4: String,
    /// Expiry month
    pub expiry_month: u32,
    /// Expiry year
    pub expiry_year: i32,
    /// Name printed on the card
    pub cardholder_name: String,
}

/// Payment details carried by a booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Amount to charge
    pub amount: Decimal,
    /// ISO currency code; the gateway default applies when omitted
    #[serde(default)]
    pub currency: Option<String>,
    /// Card to charge
    pub payment_method: PaymentMethod,
}

/// Standalone payment request against an existing booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Amount to charge
    pub amount: Decimal,
    /// ISO currency code
    #[serde(default)]
    pub currency: Option<String>,
    /// Card to charge
    pub payment_method: PaymentMethod,
}

/// Refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Payment to refund
    pub payment_id: PaymentId,
    /// Partial amount; the full payment amount when omitted
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Free-form reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// A recorded payment attempt. Both completed and failed attempts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,
    /// At most one payment per booking
    pub booking_id: BookingId,
    /// Current status
    pub status: PaymentStatus,
    /// Gateway transaction reference, unique
    pub transaction_id: String,
    /// Charged amount
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Masked instrument
    pub payment_method: CardSummary,
    /// Set iff `status` is `failed`
    pub failure_reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Passes the payment through unless the gateway declined it.
    ///
    /// # Errors
    ///
    /// `PaymentDeclined` carrying the payment id and decline reason when the
    /// status is `failed`.
    pub fn accepted(self) -> Result<Self, DomainError> {
        if self.status != PaymentStatus::Failed {
            return Ok(self);
        }
        Err(DomainError::PaymentDeclined {
            payment_id: self.id,
            reason: self
                .failure_reason
                .unwrap_or_else(|| "Payment declined".to_string()),
        })
    }
}

/// A refund issued against a completed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    /// Refund id
    pub id: RefundId,
    /// Refunded payment
    pub payment_id: PaymentId,
    /// Refund status
    pub status: RefundStatus,
    /// Refunded amount
    pub amount: Decimal,
    /// Reason given
    pub reason: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn card() -> PaymentMethod {
        PaymentMethod {
            method_type: "card".to_string(),
            card_number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            cvv: "123".to_string(),
            cardholder_name: "Ada Lovelace".to_string(),
        }
    }

    fn message(result: Result<(), DomainError>) -> String {
        match result {
            Err(DomainError::Validation(msg)) => msg,
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn test_valid_card_passes() {
        assert!(card().validate(now()).is_ok());
    }

    #[test]
    fn test_non_digit_card_number() {
        let method = PaymentMethod {
            card_number: "4242-4242-4242-42".to_string(),
            ..card()
        };
        assert_eq!(message(method.validate(now())), "Card number must contain only digits");
    }

    #[test]
    fn test_expired_card() {
        let last_year = PaymentMethod {
            expiry_year: 2024,
            ..card()
        };
        assert_eq!(message(last_year.validate(now())), "Card has expired");

        let last_month = PaymentMethod {
            expiry_year: 2025,
            expiry_month: 5,
            ..card()
        };
        assert_eq!(message(last_month.validate(now())), "Card has expired");

        let this_month = PaymentMethod {
            expiry_year: 2025,
            expiry_month: 6,
            ..card()
        };
        assert!(this_month.validate(now()).is_ok());
    }

    #[test]
    fn test_non_digit_cvv() {
        let method = PaymentMethod {
            cvv: "12a".to_string(),
            ..card()
        };
        assert_eq!(message(method.validate(now())), "CVV must contain only digits");
    }

    #[test]
    fn test_summary_masks_card() {
        let summary = card().summary();
        assert_eq!(summary.last4, "4242");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("4242424242424242"));
        assert!(!json.contains("cvv"));
        assert!(!format!("{:?}", card()).contains("4242424242424242"));
    }

    #[test]
    fn test_method_type_defaults_to_card() {
        let json = r#"{"cardNumber":"4242424242424242","expiryMonth":1,"expiryYear":2030,"cvv":"123","cardholderName":"A"}"#;
        let method: PaymentMethod = serde_json::from_str(json).unwrap();
        assert_eq!(method.method_type, "card");
    }

    #[test]
    fn test_only_failed_payment_is_declined() {
        let at = now();
        let payment = Payment {
            id: PaymentId::new(),
            booking_id: BookingId::new(),
            status: PaymentStatus::Completed,
            transaction_id: "txn_1".to_string(),
            amount: Decimal::new(10000, 2),
            currency: "USD".to_string(),
            payment_method: card().summary(),
            failure_reason: None,
            created_at: at,
            updated_at: at,
        };
        assert_eq!(payment.clone().accepted().unwrap(), payment);

        let failed = Payment {
            status: PaymentStatus::Failed,
            failure_reason: Some("Expired card".to_string()),
            ..payment
        };
        assert_eq!(
            failed.clone().accepted().unwrap_err(),
            DomainError::PaymentDeclined {
                payment_id: failed.id,
                reason: "Expired card".to_string(),
            }
        );
    }

    #[test]
    fn test_status_round_trips_through_storage_text() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("void".parse::<RefundStatus>().is_err());
    }

    proptest! {
        #[test]
        fn prop_validation_is_deterministic(
            number in "[0-9a-z]{10,20}",
            month in 0u32..14,
            year in 2020i32..2035,
            cvv in "[0-9x]{2,5}",
        ) {
            let method = PaymentMethod {
                card_number: number,
                expiry_month: month,
                expiry_year: year,
                cvv,
                ..card()
            };
            let first = method.validate(now());
            let second = method.clone().validate(now());
            prop_assert_eq!(first, second);
        }
    }
}
