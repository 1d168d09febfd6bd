//! Notification creation and live fan-out.
//!
//! ```text
//! orchestrator ──dispatch(draft)──► outbox (FIFO) ──► OutboxWorker
//!                                                     ├─ 1. persist (retry on transient errors)
//!                                                     └─ 2. broker.publish(user)
//! ```
//!
//! Domain operations never wait on delivery: [`NotificationBroadcaster::dispatch`]
//! only enqueues. A single supervised [`OutboxWorker`] drains the queue in
//! order, so notifications for one user reach each of their channels in
//! creation order. Failures are logged and counted, never returned to the
//! operation that caused the event. A panic while handling one entry is
//! caught and logged; the worker moves on to the next.

use crate::metrics::NotificationMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use bookings_core::broker::{ConnectionId, NotificationBroker};
use bookings_core::environment::Clock;
use bookings_core::{
    DomainError, Notification, NotificationCounts, NotificationDraft, NotificationId, NotificationStore,
    Page, Result, UserId,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Work queued for the outbox worker.
#[derive(Debug, Clone)]
pub enum OutboxEntry {
    /// Store the notification, then deliver it.
    Persist(Notification),
    /// Already stored; deliver only.
    Deliver(Notification),
}

/// Creates notifications and pushes them to subscribed connections.
///
/// Cheap to clone; all clones feed the same outbox. The paired
/// [`OutboxWorker`] stops once every clone has been dropped and the queue
/// is drained.
#[derive(Clone)]
pub struct NotificationBroadcaster {
    store: Arc<dyn NotificationStore>,
    broker: Arc<dyn NotificationBroker>,
    clock: Arc<dyn Clock>,
    outbox: mpsc::UnboundedSender<OutboxEntry>,
    worker_alive: Arc<AtomicBool>,
}

impl NotificationBroadcaster {
    /// Wire a broadcaster to its store and broker.
    ///
    /// The returned worker must be spawned for anything to be delivered.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        broker: Arc<dyn NotificationBroker>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> (Self, OutboxWorker) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let worker_alive = Arc::new(AtomicBool::new(false));
        let worker = OutboxWorker {
            rx,
            store: Arc::clone(&store),
            broker: Arc::clone(&broker),
            retry,
            alive: Arc::clone(&worker_alive),
        };
        let broadcaster = Self {
            store,
            broker,
            clock,
            outbox,
            worker_alive,
        };
        (broadcaster, worker)
    }

    /// The subscriber registry.
    #[must_use]
    pub fn broker(&self) -> &Arc<dyn NotificationBroker> {
        &self.broker
    }

    /// Whether the outbox worker is currently running.
    #[must_use]
    pub fn worker_running(&self) -> bool {
        self.worker_alive.load(Ordering::Acquire)
    }

    /// Persists a notification, then queues it for live delivery.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the record could not be written.
    pub async fn create_notification(&self, draft: NotificationDraft) -> Result<Notification> {
        let notification = draft.into_notification(NotificationId::new(), self.clock.now());
        self.store.insert(&notification).await?;
        NotificationMetrics::record_published();
        tracing::debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            "Notification created"
        );
        self.enqueue(OutboxEntry::Deliver(notification.clone()));
        Ok(notification)
    }

    /// Queues a notification for storage and delivery without waiting.
    ///
    /// Never fails; problems surface in logs and metrics only.
    pub fn dispatch(&self, draft: NotificationDraft) -> NotificationId {
        let notification = draft.into_notification(NotificationId::new(), self.clock.now());
        let id = notification.id;
        NotificationMetrics::record_published();
        self.enqueue(OutboxEntry::Persist(notification));
        id
    }

    fn enqueue(&self, entry: OutboxEntry) {
        if let Err(mpsc::error::SendError(entry)) = self.outbox.send(entry) {
            let notification = match entry {
                OutboxEntry::Persist(n) | OutboxEntry::Deliver(n) => n,
            };
            tracing::warn!(
                notification_id = %notification.id,
                user_id = %notification.user_id,
                "Outbox worker is gone, notification dropped"
            );
        }
    }

    /// Registers a live delivery channel for `user`.
    pub fn subscribe(&self, user: UserId, channel: mpsc::Sender<Notification>) -> ConnectionId {
        self.broker.subscribe(user, channel)
    }

    /// Removes a live delivery channel.
    pub fn unsubscribe(&self, user: UserId, connection: ConnectionId) -> bool {
        self.broker.unsubscribe(user, connection)
    }

    /// Pushes an existing notification to `user`'s channels immediately.
    pub fn broadcast(&self, user: UserId, notification: &Notification) -> usize {
        self.broker.publish(user, notification)
    }

    /// Pushes a notification to every connected user without storing it.
    pub fn broadcast_all(&self, notification: &Notification) -> usize {
        self.broker.publish_all(notification)
    }

    /// A page of `user`'s notifications, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self, user: UserId, page: Page) -> Result<Vec<Notification>> {
        self.store.list(user, page).await
    }

    /// `user`'s unread notifications, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_unread(&self, user: UserId) -> Result<Vec<Notification>> {
        self.store.list_unread(user).await
    }

    /// Total and unread counts.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn counts(&self, user: UserId) -> Result<NotificationCounts> {
        self.store.counts(user).await
    }

    /// Marks one of `user`'s notifications read.
    ///
    /// # Errors
    ///
    /// `NotFound` if the notification does not exist or belongs to someone else.
    pub async fn mark_read(&self, id: NotificationId, user: UserId) -> Result<()> {
        if self.store.mark_read(id, user, self.clock.now()).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Notification", id))
        }
    }

    /// Marks all of `user`'s notifications read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64> {
        self.store.mark_all_read(user, self.clock.now()).await
    }

    /// Deletes one of `user`'s notifications.
    ///
    /// # Errors
    ///
    /// `NotFound` if the notification does not exist or belongs to someone else.
    pub async fn delete(&self, id: NotificationId, user: UserId) -> Result<()> {
        if self.store.delete(id, user).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Notification", id))
        }
    }
}

/// Drains the outbox: stores pending notifications, then fans them out.
pub struct OutboxWorker {
    rx: mpsc::UnboundedReceiver<OutboxEntry>,
    store: Arc<dyn NotificationStore>,
    broker: Arc<dyn NotificationBroker>,
    retry: RetryPolicy,
    alive: Arc<AtomicBool>,
}

struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OutboxWorker {
    /// Process entries until every broadcaster handle is dropped.
    pub async fn run(mut self) {
        self.alive.store(true, Ordering::Release);
        let _alive = AliveGuard(Arc::clone(&self.alive));
        tracing::info!("Notification outbox worker started");

        while let Some(entry) = self.rx.recv().await {
            if let Err(panic) = AssertUnwindSafe(self.handle(entry)).catch_unwind().await {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(reason = %reason, "Outbox entry panicked, continuing");
            }
        }

        tracing::info!("Notification outbox worker stopped");
    }

    async fn handle(&self, entry: OutboxEntry) {
        let notification = match entry {
            OutboxEntry::Deliver(notification) => notification,
            OutboxEntry::Persist(notification) => {
                let store = Arc::clone(&self.store);
                let record = notification.clone();
                let stored = retry_with_predicate(
                    self.retry.clone(),
                    || {
                        let store = Arc::clone(&store);
                        let record = record.clone();
                        async move { store.insert(&record).await }
                    },
                    DomainError::is_transient,
                )
                .await;

                if let Err(err) = stored {
                    NotificationMetrics::record_persist_failure();
                    tracing::warn!(
                        notification_id = %notification.id,
                        user_id = %notification.user_id,
                        error = %err,
                        "Failed to store notification, skipping delivery"
                    );
                    return;
                }
                notification
            }
        };

        let delivered = self.broker.publish(notification.user_id, &notification);
        tracing::debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            delivered,
            "Notification delivered"
        );
    }
}
