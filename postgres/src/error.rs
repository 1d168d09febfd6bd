use bookings_core::DomainError;

/// Maps a sqlx failure onto the domain taxonomy.
pub(crate) fn storage_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            metrics::counter!("postgres_unique_violations_total").increment(1);
            return DomainError::Conflict(
                db.constraint()
                    .map_or_else(|| db.message().to_string(), |c| format!("duplicate value violates {c}")),
            );
        }
    }
    tracing::error!(error = %err, "Database operation failed");
    DomainError::Storage(err.to_string())
}

/// A stored value that no longer parses into its domain type.
pub(crate) fn corrupt(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::Storage(format!("invalid {column} in database: {err}"))
}

/// Converts a database count to `u64`.
pub(crate) fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
