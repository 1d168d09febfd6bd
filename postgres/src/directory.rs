use crate::error::storage_error;
use bookings_core::{
    ServiceCatalog, ServiceId, ServiceListing, StoreFuture, UserDirectory, UserId,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    provider_id: Uuid,
    title: String,
    price: Decimal,
    currency: String,
    duration_minutes: i32,
}

impl From<ServiceRow> for ServiceListing {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: ServiceId::from_uuid(row.id),
            provider_id: UserId::from_uuid(row.provider_id),
            title: row.title,
            price: row.price,
            currency: row.currency,
            duration_minutes: row.duration_minutes,
        }
    }
}

/// Read-only [`ServiceCatalog`] over the `services` table.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Catalog over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ServiceCatalog for PostgresCatalog {
    fn get_service(&self, id: ServiceId) -> StoreFuture<'_, Option<ServiceListing>> {
        Box::pin(async move {
            let row: Option<ServiceRow> = sqlx::query_as(
                r"
                SELECT id, provider_id, title, price, currency, duration_minutes
                FROM services
                WHERE id = $1
                ",
            )
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(row.map(ServiceListing::from))
        })
    }
}

/// Read-only [`UserDirectory`] over the `users` table.
///
/// Identities that parse as a UUID are matched on `id`, anything else on
/// `email`, case-insensitively.
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for PostgresUserDirectory {
    fn resolve<'a>(&'a self, identity: &'a str) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(async move {
            let row: Option<(Uuid,)> = match identity.parse::<Uuid>() {
                Ok(id) => sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await,
                Err(_) => sqlx::query_as("SELECT id FROM users WHERE lower(email) = lower($1)")
                    .bind(identity)
                    .fetch_optional(&self.pool)
                    .await,
            }
            .map_err(storage_error)?;
            Ok(row.map(|(id,)| UserId::from_uuid(id)))
        })
    }
}
