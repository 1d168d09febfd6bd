use crate::error::{corrupt, count, storage_error};
use bookings_core::{
    DomainError, Notification, NotificationCounts, NotificationId, NotificationStore,
    NotificationType, Page, Result, StoreFuture, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

const COLUMNS: &str = "id, user_id, type, title, message, data, is_read, created_at, read_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    message: String,
    data: Json<serde_json::Value>,
    is_read: bool,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Self {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            notification_type: row
                .kind
                .parse::<NotificationType>()
                .map_err(|e| corrupt("notification type", e))?,
            title: row.title,
            message: row.message,
            data: row.data.0,
            is_read: row.is_read,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

/// [`NotificationStore`] over the `notifications` table.
#[derive(Debug, Clone)]
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    /// Store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationStore for PostgresNotificationStore {
    fn insert(&self, notification: &Notification) -> StoreFuture<'_, ()> {
        let notification = notification.clone();
        Box::pin(async move {
            sqlx::query(&format!(
                "INSERT INTO notifications ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ))
            .bind(*notification.id.as_uuid())
            .bind(*notification.user_id.as_uuid())
            .bind(notification.notification_type.as_str())
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(Json(&notification.data))
            .bind(notification.is_read)
            .bind(notification.created_at)
            .bind(notification.read_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(())
        })
    }

    fn list(&self, user: UserId, page: Page) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
            ))
            .bind(*user.as_uuid())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
            rows.into_iter().map(Notification::try_from).collect()
        })
    }

    fn list_unread(&self, user: UserId) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 AND NOT is_read \
                 ORDER BY created_at DESC"
            ))
            .bind(*user.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
            rows.into_iter().map(Notification::try_from).collect()
        })
    }

    fn mark_read(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE notifications
                SET is_read = TRUE, read_at = COALESCE(read_at, $3)
                WHERE id = $1 AND user_id = $2
                ",
            )
            .bind(*id.as_uuid())
            .bind(*user.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn mark_all_read(&self, user: UserId, at: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
            )
            .bind(*user.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(result.rows_affected())
        })
    }

    fn delete(&self, id: NotificationId, user: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
                .bind(*id.as_uuid())
                .bind(*user.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn counts(&self, user: UserId) -> StoreFuture<'_, NotificationCounts> {
        Box::pin(async move {
            let (total, unread): (i64, i64) = sqlx::query_as(
                r"
                SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read)
                FROM notifications
                WHERE user_id = $1
                ",
            )
            .bind(*user.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(NotificationCounts {
                total: count(total),
                unread: count(unread),
            })
        })
    }
}
