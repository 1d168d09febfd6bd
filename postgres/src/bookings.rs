use crate::error::{corrupt, storage_error};
use bookings_core::{
    Booking, BookingId, BookingStatus, BookingStore, Result, ServiceId, StoreFuture, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "id, customer_id, service_id, provider_id, status, scheduled_at, \
                       duration_minutes, total_amount, notes, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    customer_id: Uuid,
    service_id: Uuid,
    provider_id: Uuid,
    status: String,
    scheduled_at: DateTime<Utc>,
    duration_minutes: i32,
    total_amount: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = bookings_core::DomainError;

    fn try_from(row: BookingRow) -> Result<Self> {
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            customer_id: UserId::from_uuid(row.customer_id),
            service_id: ServiceId::from_uuid(row.service_id),
            provider_id: UserId::from_uuid(row.provider_id),
            status: row
                .status
                .parse::<BookingStatus>()
                .map_err(|e| corrupt("booking status", e))?,
            scheduled_at: row.scheduled_at,
            duration_minutes: row.duration_minutes,
            total_amount: row.total_amount,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// [`BookingStore`] over the `bookings` table.
#[derive(Debug, Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BookingStore for PostgresBookingStore {
    fn insert(&self, booking: &Booking) -> StoreFuture<'_, ()> {
        let booking = booking.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO bookings (
                    id, customer_id, service_id, provider_id, status, scheduled_at,
                    duration_minutes, total_amount, notes, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(*booking.id.as_uuid())
            .bind(*booking.customer_id.as_uuid())
            .bind(*booking.service_id.as_uuid())
            .bind(*booking.provider_id.as_uuid())
            .bind(booking.status.as_str())
            .bind(booking.scheduled_at)
            .bind(booking.duration_minutes)
            .bind(booking.total_amount)
            .bind(&booking.notes)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(())
        })
    }

    fn get(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row: Option<BookingRow> =
                sqlx::query_as(&format!("SELECT {COLUMNS} FROM bookings WHERE id = $1"))
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_error)?;
            row.map(Booking::try_from).transpose()
        })
    }

    fn update(&self, booking: &Booking) -> StoreFuture<'_, bool> {
        let booking = booking.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE bookings
                SET status = $2, scheduled_at = $3, notes = $4, updated_at = $5
                WHERE id = $1
                ",
            )
            .bind(*booking.id.as_uuid())
            .bind(booking.status.as_str())
            .bind(booking.scheduled_at)
            .bind(&booking.notes)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete(&self, id: BookingId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
                .bind(*id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn list_for_party(&self, user: UserId) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM bookings \
                 WHERE customer_id = $1 OR provider_id = $1 \
                 ORDER BY created_at DESC"
            ))
            .bind(*user.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
            rows.into_iter().map(Booking::try_from).collect()
        })
    }
}
