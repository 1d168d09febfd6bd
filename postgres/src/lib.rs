//! `PostgreSQL` storage for the booking platform.
//!
//! Implements every storage and lookup port from `bookings-core` over a
//! shared sqlx [`PgPool`]:
//!
//! - [`PostgresBookingStore`]: bookings
//! - [`PostgresPaymentStore`]: payments and refunds
//! - [`PostgresNotificationStore`]: persisted notifications
//! - [`PostgresCatalog`] / [`PostgresUserDirectory`]: read-only lookups
//!   against the externally managed `services` and `users` tables
//!
//! Backend failures are translated at this boundary: unique violations become
//! [`DomainError::Conflict`](bookings_core::DomainError::Conflict), anything
//! else becomes [`DomainError::Storage`](bookings_core::DomainError::Storage).
//!
//! # Example
//!
//! ```no_run
//! use bookings_postgres::PostgresStores;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = PostgresStores::connect("postgres://localhost/bookings", 10).await?;
//! stores.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod directory;
mod error;
mod notifications;
mod payments;

pub use bookings::PostgresBookingStore;
pub use directory::{PostgresCatalog, PostgresUserDirectory};
pub use notifications::PostgresNotificationStore;
pub use payments::PostgresPaymentStore;

use bookings_core::{DomainError, Result};
use error::storage_error;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Every store, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStores {
    pool: PgPool,
}

impl PostgresStores {
    /// Opens a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(storage_error)?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Booking store over the shared pool.
    #[must_use]
    pub fn bookings(&self) -> PostgresBookingStore {
        PostgresBookingStore::new(self.pool.clone())
    }

    /// Payment store over the shared pool.
    #[must_use]
    pub fn payments(&self) -> PostgresPaymentStore {
        PostgresPaymentStore::new(self.pool.clone())
    }

    /// Notification store over the shared pool.
    #[must_use]
    pub fn notifications(&self) -> PostgresNotificationStore {
        PostgresNotificationStore::new(self.pool.clone())
    }

    /// Service catalog over the shared pool.
    #[must_use]
    pub fn catalog(&self) -> PostgresCatalog {
        PostgresCatalog::new(self.pool.clone())
    }

    /// User directory over the shared pool.
    #[must_use]
    pub fn users(&self) -> PostgresUserDirectory {
        PostgresUserDirectory::new(self.pool.clone())
    }
}
