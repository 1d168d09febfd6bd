use crate::error::{corrupt, storage_error};
use bookings_core::{
    BookingId, CardSummary, DomainError, Payment, PaymentId, PaymentStatus, PaymentStore, Refund,
    RefundId, RefundStatus, Result, StoreFuture,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, booking_id, status, transaction_id, amount, currency, \
                               payment_method, failure_reason, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    status: String,
    transaction_id: String,
    amount: Decimal,
    currency: String,
    payment_method: Json<CardSummary>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            id: PaymentId::from_uuid(row.id),
            booking_id: BookingId::from_uuid(row.booking_id),
            status: row
                .status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt("payment status", e))?,
            transaction_id: row.transaction_id,
            amount: row.amount,
            currency: row.currency,
            payment_method: row.payment_method.0,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    payment_id: Uuid,
    status: String,
    amount: Decimal,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = DomainError;

    fn try_from(row: RefundRow) -> Result<Self> {
        Ok(Self {
            id: RefundId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            status: row
                .status
                .parse::<RefundStatus>()
                .map_err(|e| corrupt("refund status", e))?,
            amount: row.amount,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// [`PaymentStore`] over the `payments` and `refunds` tables.
///
/// The instrument is stored as JSONB in its masked [`CardSummary`] form;
/// full card numbers and CVVs never reach the database.
#[derive(Debug, Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_payment(&self, column: &str, id: Uuid) -> Result<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Payment::try_from).transpose()
    }
}

impl PaymentStore for PostgresPaymentStore {
    fn insert_payment(&self, payment: &Payment) -> StoreFuture<'_, ()> {
        let payment = payment.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO payments (
                    id, booking_id, status, transaction_id, amount, currency,
                    payment_method, failure_reason, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(*payment.id.as_uuid())
            .bind(*payment.booking_id.as_uuid())
            .bind(payment.status.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(Json(&payment.payment_method))
            .bind(&payment.failure_reason)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

            tracing::debug!(
                payment_id = %payment.id,
                booking_id = %payment.booking_id,
                status = %payment.status,
                "Payment row inserted"
            );
            Ok(())
        })
    }

    fn get_payment(&self, id: PaymentId) -> StoreFuture<'_, Option<Payment>> {
        Box::pin(async move { self.fetch_payment("id", *id.as_uuid()).await })
    }

    fn get_payment_by_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Payment>> {
        Box::pin(async move { self.fetch_payment("booking_id", *booking_id.as_uuid()).await })
    }

    fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        failure_reason: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE payments
                SET status = $2, failure_reason = $3, updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(*id.as_uuid())
            .bind(status.as_str())
            .bind(failure_reason)
            .bind(updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn mark_refunded(&self, id: PaymentId, updated_at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE payments
                SET status = 'refunded', updated_at = $2
                WHERE id = $1 AND status = 'completed'
                ",
            )
            .bind(*id.as_uuid())
            .bind(updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(result.rows_affected() == 1)
        })
    }

    fn insert_refund(&self, refund: &Refund) -> StoreFuture<'_, ()> {
        let refund = refund.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO refunds (id, payment_id, status, amount, reason, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(*refund.id.as_uuid())
            .bind(*refund.payment_id.as_uuid())
            .bind(refund.status.as_str())
            .bind(refund.amount)
            .bind(&refund.reason)
            .bind(refund.created_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(())
        })
    }

    fn list_refunds(&self, payment_id: PaymentId) -> StoreFuture<'_, Vec<Refund>> {
        Box::pin(async move {
            let rows: Vec<RefundRow> = sqlx::query_as(
                r"
                SELECT id, payment_id, status, amount, reason, created_at
                FROM refunds
                WHERE payment_id = $1
                ORDER BY created_at ASC
                ",
            )
            .bind(*payment_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
            rows.into_iter().map(Refund::try_from).collect()
        })
    }
}
